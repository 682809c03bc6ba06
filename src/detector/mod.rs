//! Streaming anomaly detection
//!
//! [`AdaptiveDetector`] owns the value predictor, the threshold generator,
//! the frozen normalization statistics and the two rolling windows.

mod controller;
mod history;
mod normalize;
mod sink;
mod stream;

pub use controller::{AdaptiveDetector, Decision, Phase};
pub use history::RollingWindow;
pub use normalize::NormalizationStats;
pub use sink::{CsvSink, DecisionRecord, DecisionSink};
pub use stream::{StopHandle, StreamSummary};
