//! Detector configuration
//!
//! Every field has a default, so a JSON file only needs to list the options
//! it changes.

use crate::error::{Error, Result};
use crate::model::{NetworkConfig, WeightInit};
use crate::optim::AdamConfig;
use crate::threshold::ThresholdConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// How a prediction is compared with the observed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMetric {
    /// `|predicted - actual|`
    Absolute,
    /// `(predicted - actual)²`
    Squared,
}

impl Default for ErrorMetric {
    fn default() -> Self {
        ErrorMetric::Absolute
    }
}

impl ErrorMetric {
    pub fn apply(self, predicted: f64, actual: f64) -> f64 {
        match self {
            ErrorMetric::Absolute => (predicted - actual).abs(),
            ErrorMetric::Squared => (predicted - actual).powi(2),
        }
    }
}

/// Configuration of the streaming detector and both of its models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Time steps per model window
    pub lookback_len: usize,
    /// Values forecast per window
    pub prediction_len: usize,
    /// Hidden state width of both models
    pub hidden_size: usize,
    /// Stacked recurrent layers in both models
    pub num_layers: usize,
    /// Observations buffered before the initial training
    pub train_size: usize,
    pub learning_rate: f64,
    /// Epochs over the warm-up buffer
    pub epoch_train: usize,
    /// Adam steps per model after each observation
    pub epoch_update: usize,
    /// Floor of every generated threshold
    pub minimal_threshold: f64,
    /// Raw values below this are always anomalous
    pub value_lower_bound: f64,
    /// Raw values above this are always anomalous
    pub value_upper_bound: f64,
    /// Weight initialization seed; `None` draws from entropy
    pub seed: Option<u64>,
    pub weight_init: WeightInit,
    pub optimizer: AdamConfig,
    pub threshold: ThresholdConfig,
    pub error_metric: ErrorMetric,
    /// Feed the prediction instead of a flagged value into the observation window
    pub substitute_anomalies: bool,
    /// Start each window from the state carried by the previous training
    /// step. `false` starts every window from zeros.
    pub stateful: bool,
    /// Added to the training standard deviation before dividing by it
    pub normalization_epsilon: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            lookback_len: 3,
            prediction_len: 1,
            hidden_size: 16,
            num_layers: 1,
            train_size: 200,
            learning_rate: 1e-3,
            epoch_train: 50,
            epoch_update: 5,
            minimal_threshold: 0.05,
            value_lower_bound: f64::MIN,
            value_upper_bound: f64::MAX,
            seed: None,
            weight_init: WeightInit::default(),
            optimizer: AdamConfig::default(),
            threshold: ThresholdConfig::default(),
            error_metric: ErrorMetric::default(),
            substitute_anomalies: true,
            stateful: true,
            normalization_epsilon: 1e-8,
        }
    }
}

impl DetectorConfig {
    pub fn with_lookback(mut self, lookback_len: usize) -> Self {
        self.lookback_len = lookback_len;
        self
    }

    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.hidden_size = hidden_size;
        self
    }

    pub fn with_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers;
        self
    }

    pub fn with_train_size(mut self, train_size: usize) -> Self {
        self.train_size = train_size;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the warm-up and per-observation epoch counts
    pub fn with_epochs(mut self, epoch_train: usize, epoch_update: usize) -> Self {
        self.epoch_train = epoch_train;
        self.epoch_update = epoch_update;
        self
    }

    pub fn with_minimal_threshold(mut self, minimal_threshold: f64) -> Self {
        self.minimal_threshold = minimal_threshold;
        self
    }

    pub fn with_value_range(mut self, lower: f64, upper: f64) -> Self {
        self.value_lower_bound = lower;
        self.value_upper_bound = upper;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_error_metric(mut self, metric: ErrorMetric) -> Self {
        self.error_metric = metric;
        self
    }

    pub fn with_threshold(mut self, threshold: ThresholdConfig) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_substitution(mut self, substitute_anomalies: bool) -> Self {
        self.substitute_anomalies = substitute_anomalies;
        self
    }

    pub fn with_stateful(mut self, stateful: bool) -> Self {
        self.stateful = stateful;
        self
    }

    /// Shape of the value predictor
    pub fn predictor_network(&self) -> NetworkConfig {
        NetworkConfig::new(1, self.hidden_size, self.prediction_len)
            .with_layers(self.num_layers)
            .with_weight_init(self.weight_init)
    }

    /// Shape of the threshold generator
    pub fn generator_network(&self) -> NetworkConfig {
        NetworkConfig::new(1, self.hidden_size, 1)
            .with_layers(self.num_layers)
            .with_weight_init(self.weight_init)
    }

    /// Random source for weight initialization
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfiguration(msg));

        for (name, value) in [
            ("lookback_len", self.lookback_len),
            ("prediction_len", self.prediction_len),
            ("hidden_size", self.hidden_size),
            ("num_layers", self.num_layers),
            ("epoch_train", self.epoch_train),
            ("epoch_update", self.epoch_update),
        ] {
            if value == 0 {
                return invalid(format!("{} must be positive", name));
            }
        }
        if self.prediction_len != 1 {
            return invalid(format!(
                "streaming detection forecasts one step ahead, got prediction_len {}",
                self.prediction_len
            ));
        }
        if self.train_size <= self.lookback_len {
            return invalid(format!(
                "train_size ({}) must exceed lookback_len ({})",
                self.train_size, self.lookback_len
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if !(self.minimal_threshold.is_finite() && self.minimal_threshold > 0.0) {
            return invalid(format!(
                "minimal_threshold must be positive, got {}",
                self.minimal_threshold
            ));
        }
        if self.minimal_threshold > self.threshold.max_threshold {
            return invalid(format!(
                "minimal_threshold ({}) exceeds max_threshold ({})",
                self.minimal_threshold, self.threshold.max_threshold
            ));
        }
        if self.value_lower_bound >= self.value_upper_bound {
            return invalid(format!(
                "value range [{}, {}] is empty",
                self.value_lower_bound, self.value_upper_bound
            ));
        }
        if !(self.normalization_epsilon > 0.0) {
            return invalid("normalization_epsilon must be positive".to_string());
        }
        self.optimizer.validate()?;
        self.threshold.validate()?;
        self.predictor_network().validate()?;
        Ok(())
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::Squash;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = DetectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lookback_len, 3);
        assert_eq!(config.train_size, 200);
        assert_eq!(config.error_metric, ErrorMetric::Absolute);
        assert!(config.substitute_anomalies);
        assert!(config.stateful);
    }

    #[test]
    fn test_invalid_configurations() {
        let base = DetectorConfig::default();
        let cases = [
            base.clone().with_lookback(0),
            base.clone().with_hidden_size(0),
            base.clone().with_minimal_threshold(0.0),
            base.clone().with_minimal_threshold(-0.1),
            base.clone().with_minimal_threshold(2.0),
            base.clone().with_train_size(3),
            base.clone().with_learning_rate(0.0),
            base.clone().with_value_range(5.0, 5.0),
            base.clone().with_epochs(0, 1),
            DetectorConfig {
                prediction_len: 2,
                ..base.clone()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(Error::InvalidConfiguration(_))),
                "accepted {:?}",
                config
            );
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"lookback_len": 5, "train_size": 20, "error_metric": "squared", "threshold": {{"squash": "Clamp"}}}}"#
        )
        .unwrap();

        let config = DetectorConfig::from_json_file(file.path()).unwrap();

        assert_eq!(config.lookback_len, 5);
        assert_eq!(config.train_size, 20);
        assert_eq!(config.error_metric, ErrorMetric::Squared);
        assert_eq!(config.threshold.squash, Squash::Clamp);
        assert_eq!(config.hidden_size, 16);
        assert_eq!(config.threshold.upper_bound, 1.0);
    }

    #[test]
    fn test_json_file_is_validated() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"minimal_threshold": 0.0}}"#).unwrap();
        assert!(DetectorConfig::from_json_file(file.path()).is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = DetectorConfig::default().with_seed(7).with_value_range(-1.0, 1.0);
        let parsed: DetectorConfig = serde_json::from_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_error_metric() {
        assert_eq!(ErrorMetric::Absolute.apply(1.0, 3.5), 2.5);
        assert_eq!(ErrorMetric::Squared.apply(1.0, 3.5), 6.25);
    }

    #[test]
    fn test_network_shapes_follow_config() {
        let config = DetectorConfig::default().with_hidden_size(8).with_layers(2);
        let predictor = config.predictor_network();
        let generator = config.generator_network();
        assert_eq!(predictor.hidden_size, 8);
        assert_eq!(predictor.num_layers, 2);
        assert_eq!(generator.output_size, 1);
    }
}
