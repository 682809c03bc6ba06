//! Streaming controller
//!
//! Buffers the first `train_size` observations, then trains both models once
//! and switches to per-observation detection with online adaptation.

use super::history::RollingWindow;
use super::normalize::NormalizationStats;
use super::sink::DecisionRecord;
use crate::config::DetectorConfig;
use crate::data::DataPoint;
use crate::error::{Error, Result};
use crate::linalg::sliding_windows;
use crate::model::OnlineModel;
use crate::predictor::ValuePredictor;
use crate::threshold::ThresholdGenerator;
use tracing::{debug, info, warn};

/// Lifecycle of a detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Collecting the initial training buffer
    Warmup,
    /// Detecting and adapting
    Trained,
}

/// Outcome for one observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub is_anomaly: bool,
    /// Forecast in raw units
    pub predicted: f64,
    /// Threshold the error was compared with
    pub threshold: f64,
    /// Prediction error in normalized units
    pub error: f64,
    pub normalized: f64,
    /// The raw value fell outside the configured value range
    pub out_of_range: bool,
}

#[derive(Debug, Clone)]
enum DetectorState {
    Warmup { buffer: Vec<f64> },
    Trained(TrainedState),
}

/// Frozen statistics and the two sliding windows
#[derive(Debug, Clone)]
struct TrainedState {
    stats: NormalizationStats,
    observations: RollingWindow,
    errors: RollingWindow,
}

fn check_finite(value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::NonFiniteObservation(value))
    }
}

/// Value predictor and threshold generator driven one observation at a time
#[derive(Debug, Clone)]
pub struct AdaptiveDetector {
    config: DetectorConfig,
    predictor: ValuePredictor,
    generator: ThresholdGenerator,
    state: DetectorState,
    seen: u64,
}

impl AdaptiveDetector {
    /// Validate `config` and initialize both models.
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = config.rng();
        let predictor = ValuePredictor::from_config(&config, &mut rng)?;
        let generator = ThresholdGenerator::from_config(&config, &mut rng)?;

        info!(
            lookback = config.lookback_len,
            hidden = config.hidden_size,
            layers = config.num_layers,
            train_size = config.train_size,
            "detector created"
        );

        Ok(Self {
            state: DetectorState::Warmup {
                buffer: Vec::with_capacity(config.train_size),
            },
            config,
            predictor,
            generator,
            seen: 0,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn predictor(&self) -> &ValuePredictor {
        &self.predictor
    }

    pub fn generator(&self) -> &ThresholdGenerator {
        &self.generator
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            DetectorState::Warmup { .. } => Phase::Warmup,
            DetectorState::Trained(_) => Phase::Trained,
        }
    }

    /// Observations fed so far, warm-up included
    pub fn observations_seen(&self) -> u64 {
        self.seen
    }

    /// Frozen normalization statistics, once trained
    pub fn stats(&self) -> Option<&NormalizationStats> {
        match &self.state {
            DetectorState::Trained(trained) => Some(&trained.stats),
            DetectorState::Warmup { .. } => None,
        }
    }

    /// Normalized values the next prediction will read, oldest first
    pub fn observation_window(&self) -> Option<Vec<f64>> {
        match &self.state {
            DetectorState::Trained(trained) => Some(trained.observations.to_vec()),
            DetectorState::Warmup { .. } => None,
        }
    }

    /// Errors the next threshold will be generated from, oldest first
    pub fn error_window(&self) -> Option<Vec<f64>> {
        match &self.state {
            DetectorState::Trained(trained) => Some(trained.errors.to_vec()),
            DetectorState::Warmup { .. } => None,
        }
    }

    /// Feed one raw observation.
    ///
    /// Returns `None` while warming up. The observation that completes the
    /// warm-up buffer triggers the initial training and gets no decision.
    /// NaN and infinite values are rejected before any state changes.
    pub fn feed_observation(&mut self, value: f64) -> Result<Option<Decision>> {
        check_finite(value)?;
        let index = self.seen;
        self.seen += 1;

        match &mut self.state {
            DetectorState::Warmup { buffer } => {
                buffer.push(value);
                if buffer.len() < self.config.train_size {
                    return Ok(None);
                }
                let buffer = std::mem::take(buffer);
                self.train_initial(&buffer)?;
                Ok(None)
            }
            DetectorState::Trained(trained) => trained
                .detect(
                    &self.config,
                    &mut self.predictor,
                    &mut self.generator,
                    value,
                    index,
                )
                .map(Some),
        }
    }

    /// [`AdaptiveDetector::feed_observation`] for a labelled data point,
    /// producing the record written to the result log.
    pub fn feed_point(&mut self, point: &DataPoint) -> Result<Option<DecisionRecord>> {
        let index = self.seen;
        let decision = self.feed_observation(point.value)?;
        Ok(decision.map(|d| DecisionRecord {
            index,
            timestamp: Some(point.timestamp.clone()),
            value: point.value,
            normalized: d.normalized,
            predicted: d.predicted,
            error: d.error,
            threshold: d.threshold,
            is_anomaly: d.is_anomaly,
            label: Some(point.is_anomaly),
        }))
    }

    /// Fit normalization statistics and train both models on `values`, then
    /// switch to detection.
    pub fn train_initial(&mut self, values: &[f64]) -> Result<()> {
        if self.phase() == Phase::Trained {
            return Err(Error::AlreadyTrained);
        }
        for &value in values {
            check_finite(value)?;
        }
        let lookback = self.config.lookback_len;
        if values.len() <= lookback {
            return Err(Error::InsufficientData {
                required: lookback,
                actual: values.len(),
            });
        }

        let stats = NormalizationStats::fit(values, self.config.normalization_epsilon)?;
        let normalized = stats.normalize_all(values);
        let lr = self.config.learning_rate;
        let epochs = self.config.epoch_train;

        let windows = sliding_windows(&normalized, lookback, 1)?;
        let predictor_losses = self.predictor.train_epochs(&windows, epochs, lr)?;

        let metric = self.config.error_metric;
        let errors = windows
            .iter()
            .map(|w| Ok(metric.apply(self.predictor.predict(&w.input)?, w.target[0])))
            .collect::<Result<Vec<f64>>>()?;

        let error_windows = sliding_windows(&errors, lookback, 1)?;
        let generator_losses = if error_windows.is_empty() {
            warn!(
                errors = errors.len(),
                lookback, "too few warm-up errors to train the threshold generator"
            );
            Vec::new()
        } else {
            self.generator.train_epochs(&error_windows, epochs, lr)?
        };

        info!(
            samples = values.len(),
            mean = stats.mean,
            std = stats.std,
            predictor_loss = predictor_losses.last().copied().unwrap_or_default(),
            generator_loss = generator_losses.last().copied().unwrap_or_default(),
            "initial training complete"
        );

        self.state = DetectorState::Trained(TrainedState {
            stats,
            observations: RollingWindow::seeded(lookback, &normalized),
            errors: RollingWindow::seeded(lookback, &errors),
        });
        Ok(())
    }
}

impl TrainedState {
    fn detect(
        &mut self,
        config: &DetectorConfig,
        predictor: &mut ValuePredictor,
        generator: &mut ThresholdGenerator,
        value: f64,
        index: u64,
    ) -> Result<Decision> {
        let stats = &self.stats;
        let normalized = stats.normalize(value);
        let window = self.observations.to_vec();
        let predicted_normalized = predictor.predict(&window)?;
        let error = config.error_metric.apply(predicted_normalized, normalized);

        let error_window = self.errors.to_vec();
        let threshold = generator.generate(&error_window)?;

        let out_of_range = value < config.value_lower_bound || value > config.value_upper_bound;
        let is_anomaly = out_of_range || error > threshold;

        for _ in 0..config.epoch_update {
            predictor.train_step(&window, &[normalized], config.learning_rate)?;
            generator.train_step(&error_window, &[error], config.learning_rate)?;
        }

        if is_anomaly && config.substitute_anomalies {
            self.observations.push(predicted_normalized);
        } else {
            self.observations.push(normalized);
        }
        self.errors.push(error);

        let predicted = stats.denormalize(predicted_normalized);
        debug!(
            index,
            value,
            normalized,
            predicted,
            error,
            threshold,
            is_anomaly,
            "observation processed"
        );

        Ok(Decision {
            is_anomaly,
            predicted,
            threshold,
            error,
            normalized,
            out_of_range,
        })
    }
}
