//! Value predictor
//!
//! Forecasts the next normalized observation from a lookback window of
//! normalized observations.

use crate::config::DetectorConfig;
use crate::error::{Error, Result};
use crate::linalg::Window;
use crate::model::{OnlineModel, SequenceModel};
use rand::Rng;

#[derive(Debug, Clone)]
pub struct ValuePredictor {
    model: SequenceModel,
}

impl ValuePredictor {
    pub fn new(model: SequenceModel) -> Self {
        Self { model }
    }

    /// Build the predictor described by `config`.
    pub fn from_config<R: Rng + ?Sized>(config: &DetectorConfig, rng: &mut R) -> Result<Self> {
        let model = SequenceModel::new(
            config.predictor_network(),
            config.lookback_len,
            config.optimizer,
            config.stateful,
            rng,
        )?;
        Ok(Self::new(model))
    }

    /// All `prediction_len` forecast values
    pub fn predict_horizon(&self, window: &[f64]) -> Result<Vec<f64>> {
        Ok(self.model.forward(window)?.to_vec())
    }

    pub fn reset_state(&mut self) {
        self.model.reset_state();
    }
}

impl OnlineModel for ValuePredictor {
    /// First forecast value, unmodified
    fn predict(&self, window: &[f64]) -> Result<f64> {
        let output = self.model.forward(window)?;
        output
            .first()
            .copied()
            .ok_or(Error::EmptyInput("predictor output"))
    }

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sliding_windows;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn predictor(config: &DetectorConfig) -> ValuePredictor {
        let mut rng = StdRng::seed_from_u64(5);
        ValuePredictor::from_config(config, &mut rng).unwrap()
    }

    #[test]
    fn test_predict_rejects_wrong_window() {
        let predictor = predictor(&DetectorConfig::default());
        assert!(matches!(
            predictor.predict(&[1.0, 2.0]),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(predictor.predict(&[1.0, 2.0, 3.0]).unwrap().is_finite());
    }

    #[test]
    fn test_zero_window_predicts_zero() {
        let predictor = predictor(&DetectorConfig::default());
        assert_eq!(predictor.predict(&[0.0; 3]).unwrap(), 0.0);
    }

    #[test]
    fn test_multi_step_horizon() {
        let config = DetectorConfig {
            prediction_len: 3,
            ..DetectorConfig::default()
        };
        let predictor = predictor(&config);
        assert_eq!(predictor.predict_horizon(&[0.1, 0.2, 0.3]).unwrap().len(), 3);
    }

    #[test]
    fn test_train_step_moves_prediction() {
        let config = DetectorConfig::default().with_hidden_size(4);
        let mut predictor = predictor(&config);
        let series: Vec<f64> = (0..12).map(|t| t as f64 * 0.1).collect();
        let windows = sliding_windows(&series, 3, 1).unwrap();
        let before = predictor.predict(&windows[0].input).unwrap();

        let history = predictor.train_epochs(&windows, 2, 0.01).unwrap();

        assert_eq!(history.len(), 2);
        assert_ne!(predictor.predict(&windows[0].input).unwrap(), before);
        assert_eq!(
            predictor.sequence_model().optimizer().step_count(),
            2 * windows.len() as u64
        );
    }
}
