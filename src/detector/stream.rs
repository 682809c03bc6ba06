//! Driving a detector over a finite stream

use super::controller::{AdaptiveDetector, Phase};
use super::sink::DecisionSink;
use crate::data::DataPoint;
use crate::error::Result;
use crate::metrics::DetectionMetrics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Cooperative stop flag, checked before each observation
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a call to [`AdaptiveDetector::run`] did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSummary {
    /// Observations consumed, warm-up included
    pub processed: usize,
    /// Observations that received a decision
    pub decided: usize,
    /// Observations rejected by the detector and left out of the stream
    pub skipped: usize,
    pub anomalies: usize,
    /// The stop handle ended the run early
    pub stopped: bool,
    /// Anomaly flag of every decided observation
    pub predictions: Vec<bool>,
    /// Ground-truth label of every decided observation
    pub labels: Vec<bool>,
}

impl StreamSummary {
    /// Detection quality over the decided observations
    pub fn metrics(&self) -> Result<DetectionMetrics> {
        DetectionMetrics::from_predictions(&self.predictions, &self.labels)
    }
}

impl AdaptiveDetector {
    /// Feed `points` in order, recording every decision in `sink`.
    ///
    /// The stop handle is checked before each point; a stopped run returns
    /// what it processed so far.
    pub fn run<I, S>(&mut self, points: I, sink: &mut S, stop: &StopHandle) -> Result<StreamSummary>
    where
        I: IntoIterator<Item = DataPoint>,
        S: DecisionSink + ?Sized,
    {
        let mut summary = StreamSummary::default();

        for point in points {
            if stop.is_stopped() {
                info!(processed = summary.processed, "stream stopped");
                summary.stopped = true;
                break;
            }

            let was_warming_up = self.phase() == Phase::Warmup;
            let record = match self.feed_point(&point) {
                Ok(record) => record,
                Err(err) if err.is_recoverable() => {
                    warn!(%err, timestamp = %point.timestamp, "skipping observation");
                    summary.skipped += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };
            summary.processed += 1;
            if was_warming_up && self.phase() == Phase::Trained {
                info!(index = summary.processed - 1, "warm-up finished");
            }

            if let Some(record) = record {
                summary.decided += 1;
                if record.is_anomaly {
                    summary.anomalies += 1;
                }
                summary.predictions.push(record.is_anomaly);
                summary.labels.push(point.is_anomaly);
                sink.record(&record)?;
            }
        }

        sink.flush()?;
        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            anomalies = summary.anomalies,
            "stream finished"
        );
        Ok(summary)
    }
}
