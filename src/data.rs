//! CSV ingestion of labelled observations
//!
//! Expected columns: `timestamp, value, is_anomaly`. The first row is a
//! header. A label of `1` marks an anomaly; anything else is normal. Rows that
//! cannot be parsed are logged and skipped.

use crate::error::{Error, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// One observation of the input stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: String,
    pub value: f64,
    pub is_anomaly: bool,
}

impl DataPoint {
    pub fn new(timestamp: impl Into<String>, value: f64, is_anomaly: bool) -> Self {
        Self {
            timestamp: timestamp.into(),
            value,
            is_anomaly,
        }
    }
}

/// Load every parseable row of a CSV file.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<DataPoint>> {
    let file = File::open(path.as_ref())?;
    let points = read_points(file)?;
    info!(path = %path.as_ref().display(), points = points.len(), "loaded observations");
    Ok(points)
}

/// Read observations from any CSV source.
pub fn read_points<R: Read>(source: R) -> Result<Vec<DataPoint>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(source);

    let mut points = Vec::new();
    for result in reader.records() {
        let parsed = result
            .map_err(record_error)
            .and_then(|record| parse_record(&record));
        match parsed {
            Ok(point) => points.push(point),
            Err(err) if err.is_recoverable() => warn!(%err, "skipping record"),
            Err(err) => return Err(err),
        }
    }
    Ok(points)
}

/// Malformed rows become parse errors; reader I/O failures stay fatal.
fn record_error(err: csv::Error) -> Error {
    if err.is_io_error() {
        return Error::Csv(err);
    }
    Error::Parse {
        line: err.position().map_or(0, |p| p.line()),
        reason: err.to_string(),
    }
}

fn parse_record(record: &StringRecord) -> Result<DataPoint> {
    let line = record.position().map_or(0, |p| p.line());
    let field = |index: usize, name: &'static str| {
        record.get(index).filter(|f| !f.is_empty()).ok_or_else(|| Error::Parse {
            line,
            reason: format!("missing {} column", name),
        })
    };

    let timestamp = field(0, "timestamp")?;
    let value: f64 = field(1, "value")?.parse().map_err(|e| Error::Parse {
        line,
        reason: format!("invalid value: {}", e),
    })?;
    if !value.is_finite() {
        return Err(Error::Parse {
            line,
            reason: format!("non-finite value {}", value),
        });
    }
    let is_anomaly = record.get(2).map_or(false, |label| label == "1");

    Ok(DataPoint::new(timestamp, value, is_anomaly))
}
