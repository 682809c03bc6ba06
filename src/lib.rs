//! # Adaptive Anomaly
//!
//! Streaming anomaly detection for univariate time series. One LSTM forecasts
//! the next value, a second LSTM forecasts an adaptive error threshold, and
//! both keep learning online after every observation.
//!
//! ## Modules
//!
//! - `linalg` - Vector/matrix primitives, MSE loss, sliding windows
//! - `model` - LSTM layers with backpropagation through time
//! - `optim` - Adam optimizer and gradient clipping
//! - `predictor` / `threshold` - The two models the detector is built from
//! - `detector` - Streaming controller, normalization, decision sinks
//! - `data` / `metrics` - CSV ingestion and evaluation against labels
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use adaptive_anomaly::prelude::*;
//!
//! fn main() -> adaptive_anomaly::Result<()> {
//!     let config = DetectorConfig::default().with_train_size(100).with_seed(42);
//!     let mut detector = AdaptiveDetector::new(config)?;
//!
//!     for i in 0..500 {
//!         let value = (i as f64 * 0.1).sin();
//!         if let Some(decision) = detector.feed_observation(value)? {
//!             if decision.is_anomaly {
//!                 println!("anomaly at {}: threshold {:.3}", i, decision.threshold);
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod activation;
pub mod config;
pub mod data;
pub mod detector;
pub mod error;
pub mod linalg;
pub mod metrics;
pub mod model;
pub mod optim;
pub mod predictor;
pub mod threshold;

pub use config::{DetectorConfig, ErrorMetric};
pub use data::DataPoint;
pub use detector::{AdaptiveDetector, Decision, StopHandle};
pub use error::{Error, Result};
pub use predictor::ValuePredictor;
pub use threshold::ThresholdGenerator;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{DetectorConfig, ErrorMetric};
    pub use crate::data::{load_csv, DataPoint};
    pub use crate::detector::{
        AdaptiveDetector, CsvSink, Decision, DecisionRecord, DecisionSink, Phase, StopHandle,
        StreamSummary,
    };
    pub use crate::metrics::DetectionMetrics;
    pub use crate::model::{NetworkConfig, OnlineModel, SequenceModel, WeightInit};
    pub use crate::optim::AdamConfig;
    pub use crate::predictor::ValuePredictor;
    pub use crate::threshold::{Squash, ThresholdConfig, ThresholdGenerator};
}
