//! Error types for the anomaly detection engine

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Window, vector or parameter shapes disagree
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Optimizer update requested before its moment buffers were allocated
    #[error("Optimizer update requested before initialization")]
    UninitializedOptimizer,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Empty input where non-empty was required
    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    /// Not enough observations to build a single training window
    #[error("Insufficient data: need more than {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Initial training requested after the detector already left warm-up
    #[error("Detector is already trained")]
    AlreadyTrained,

    /// NaN or infinite observation handed to the detector
    #[error("Non-finite observation: {0}")]
    NonFiniteObservation(f64),

    /// A single input record could not be parsed
    #[error("Failed to parse record at line {line}: {reason}")]
    Parse { line: u64, reason: String },

    /// CSV reading or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a shape disagreement
    pub fn dimension(context: &'static str, expected: usize, actual: usize) -> Self {
        Error::DimensionMismatch {
            context,
            expected,
            actual,
        }
    }

    /// Whether the failure only affects the current observation.
    ///
    /// Unparseable records and rejected observations are skipped; everything
    /// else stops the stream.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Parse { .. } | Error::NonFiniteObservation(_))
    }
}
