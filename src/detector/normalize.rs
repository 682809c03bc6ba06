//! Z-score statistics frozen at the end of warm-up

use crate::error::{Error, Result};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Mean and standard deviation of the warm-up buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub mean: f64,
    /// Population standard deviation, before the epsilon floor
    pub std: f64,
    pub epsilon: f64,
}

impl NormalizationStats {
    /// Fit the statistics to `data`.
    ///
    /// A constant buffer is not an error: the divisor becomes `epsilon`.
    pub fn fit(data: &[f64], epsilon: f64) -> Result<Self> {
        let view = ArrayView1::from(data);
        let mean = view.mean().ok_or(Error::EmptyInput("normalization data"))?;
        let std = view.std(0.0);
        if std == 0.0 {
            warn!(mean, "training data has zero variance, normalizing with epsilon only");
        }
        Ok(Self { mean, std, epsilon })
    }

    /// Divisor used by [`NormalizationStats::normalize`]
    pub fn scale(&self) -> f64 {
        self.std + self.epsilon
    }

    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale()
    }

    pub fn denormalize(&self, value: f64) -> f64 {
        value * self.scale() + self.mean
    }

    pub fn normalize_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.normalize(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fit_population_std() {
        let stats = NormalizationStats::fit(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 1e-8).unwrap();
        assert_relative_eq!(stats.mean, 5.0);
        assert_relative_eq!(stats.std, 2.0, max_relative = 1e-12);
        assert_relative_eq!(stats.normalize(9.0), 2.0, max_relative = 1e-8);
    }

    #[test]
    fn test_roundtrip() {
        let stats = NormalizationStats::fit(&[1.5, -3.0, 8.25, 0.0, 4.0], 1e-8).unwrap();
        for &x in &[-1e3, -2.5, 0.0, 0.3, 7.0, 1e4] {
            assert_relative_eq!(stats.denormalize(stats.normalize(x)), x, epsilon = 1e-9, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_constant_data_uses_epsilon() {
        let stats = NormalizationStats::fit(&[3.0; 10], 1e-8).unwrap();
        assert_eq!(stats.std, 0.0);
        assert_eq!(stats.normalize(3.0), 0.0);
        assert!(stats.normalize(4.0).is_finite());
        assert_relative_eq!(stats.denormalize(stats.normalize(4.0)), 4.0, max_relative = 1e-12);
    }

    #[test]
    fn test_empty_data_rejected() {
        assert!(matches!(
            NormalizationStats::fit(&[], 1e-8),
            Err(Error::EmptyInput(_))
        ));
    }
}
