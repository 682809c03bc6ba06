//! Per-observation decision records and where they go

use crate::error::{Error, Result};
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// One processed observation, as written to the result log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    /// Zero-based position in the stream, warm-up included
    pub index: u64,
    pub timestamp: Option<String>,
    /// Raw observed value
    pub value: f64,
    pub normalized: f64,
    /// Forecast in raw units
    pub predicted: f64,
    /// Prediction error in normalized units
    pub error: f64,
    pub threshold: f64,
    pub is_anomaly: bool,
    /// Ground-truth label, when the input carried one
    pub label: Option<bool>,
}

/// Receives every decision the detector makes
pub trait DecisionSink {
    fn record(&mut self, record: &DecisionRecord) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl DecisionSink for Vec<DecisionRecord> {
    fn record(&mut self, record: &DecisionRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Writes decisions as CSV rows with a header
pub struct CsvSink<W: Write> {
    writer: Writer<W>,
}

impl CsvSink<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            writer: Writer::from_path(path)?,
        })
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: Writer::from_writer(inner),
        }
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }
}

impl<W: Write> DecisionSink for CsvSink<W> {
    fn record(&mut self, record: &DecisionRecord) -> Result<()> {
        self.writer.serialize(record)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: u64, is_anomaly: bool) -> DecisionRecord {
        DecisionRecord {
            index,
            timestamp: Some(format!("t{}", index)),
            value: 10.5,
            normalized: 0.25,
            predicted: 10.0,
            error: 0.5,
            threshold: 0.75,
            is_anomaly,
            label: None,
        }
    }

    #[test]
    fn test_csv_sink_writes_header_and_rows() {
        let mut sink = CsvSink::new(Vec::new());
        sink.record(&record(0, false)).unwrap();
        sink.record(&record(1, true)).unwrap();

        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "index,timestamp,value,normalized,predicted,error,threshold,is_anomaly,label"
        );
        assert_eq!(lines[1], "0,t0,10.5,0.25,10.0,0.5,0.75,false,");
        assert_eq!(lines[2], "1,t1,10.5,0.25,10.0,0.5,0.75,true,");
    }

    #[test]
    fn test_vec_sink_collects() {
        let mut sink: Vec<DecisionRecord> = Vec::new();
        sink.record(&record(3, true)).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].index, 3);
    }
}
