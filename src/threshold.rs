//! Adaptive threshold generator
//!
//! A second recurrent model reads the window of recent prediction errors and
//! forecasts the error it expects next. Its raw output is squashed into a
//! bounded range, floored at the minimal threshold and capped at
//! `max_threshold`.

use crate::activation::sigmoid;
use crate::config::DetectorConfig;
use crate::error::{Error, Result};
use crate::linalg::Window;
use crate::model::{OnlineModel, SequenceModel};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Bounding function applied to the raw model output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Squash {
    /// Logistic sigmoid into (0, 1)
    Sigmoid,
    /// Clamp into `[lower_bound, upper_bound]`
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub squash: Squash,
    /// Used by [`Squash::Clamp`]
    pub lower_bound: f64,
    /// Used by [`Squash::Clamp`]
    pub upper_bound: f64,
    /// Hard ceiling applied after the minimal-threshold floor
    pub max_threshold: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            squash: Squash::Sigmoid,
            lower_bound: 0.0,
            upper_bound: 1.0,
            max_threshold: 1.0,
        }
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lower_bound >= self.upper_bound {
            return Err(Error::InvalidConfiguration(format!(
                "threshold bounds [{}, {}] are empty",
                self.lower_bound, self.upper_bound
            )));
        }
        if !(self.max_threshold > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "max_threshold must be positive, got {}",
                self.max_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ThresholdGenerator {
    model: SequenceModel,
    config: ThresholdConfig,
    minimal_threshold: f64,
}

impl ThresholdGenerator {
    pub fn new(model: SequenceModel, config: ThresholdConfig, minimal_threshold: f64) -> Result<Self> {
        config.validate()?;
        if !(minimal_threshold.is_finite() && minimal_threshold > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "minimal_threshold must be positive, got {}",
                minimal_threshold
            )));
        }
        if minimal_threshold > config.max_threshold {
            return Err(Error::InvalidConfiguration(format!(
                "minimal_threshold ({}) exceeds max_threshold ({})",
                minimal_threshold, config.max_threshold
            )));
        }
        let output_size = model.network().config().output_size;
        if output_size != 1 {
            return Err(Error::dimension("threshold model output", 1, output_size));
        }

        Ok(Self {
            model,
            config,
            minimal_threshold,
        })
    }

    /// Build the generator described by `config`.
    pub fn from_config<R: Rng + ?Sized>(config: &DetectorConfig, rng: &mut R) -> Result<Self> {
        let model = SequenceModel::new(
            config.generator_network(),
            config.lookback_len,
            config.optimizer,
            config.stateful,
            rng,
        )?;
        Self::new(model, config.threshold, config.minimal_threshold)
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    pub fn minimal_threshold(&self) -> f64 {
        self.minimal_threshold
    }

    /// Unsquashed model output for an error window
    pub fn raw(&self, errors: &[f64]) -> Result<f64> {
        let output = self.model.forward(errors)?;
        output
            .first()
            .copied()
            .ok_or(Error::EmptyInput("threshold model output"))
    }

    /// Map a raw output onto the threshold range.
    pub fn squash(&self, raw: f64) -> f64 {
        let bounded = match self.config.squash {
            Squash::Sigmoid => sigmoid(raw),
            Squash::Clamp => raw.clamp(self.config.lower_bound, self.config.upper_bound),
        };
        bounded
            .max(self.minimal_threshold)
            .min(self.config.max_threshold)
    }

    /// Threshold for the window of recent prediction errors.
    pub fn generate(&self, errors: &[f64]) -> Result<f64> {
        Ok(self.squash(self.raw(errors)?))
    }

    /// [`ThresholdGenerator::generate`] over a batch of windows
    pub fn generate_many<W: AsRef<[f64]>>(&self, windows: &[W]) -> Result<Vec<f64>> {
        windows.iter().map(|w| self.generate(w.as_ref())).collect()
    }

    pub fn reset_state(&mut self) {
        self.model.reset_state();
    }
}

impl OnlineModel for ThresholdGenerator {
    fn predict(&self, window: &[f64]) -> Result<f64> {
        self.generate(window)
    }

    /// Fits the raw output to `target`, the error that was actually realized.
    fn train_step(&mut self, window: &[f64], target: &[f64], learning_rate: f64) -> Result<f64> {
        self.model.train_step(window, target, learning_rate)
    }

    fn train_epochs(&mut self, dataset: &[Window], epochs: usize, learning_rate: f64) -> Result<Vec<f64>> {
        self.model.train_epochs(dataset, epochs, learning_rate)
    }

    fn sequence_model(&self) -> &SequenceModel {
        &self.model
    }
}
