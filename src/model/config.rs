//! Shape and initialization settings for a recurrent network

use crate::error::{Error, Result};
use ndarray::Array2;
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Network shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Features per time step
    pub input_size: usize,
    /// Hidden (and cell) state width
    pub hidden_size: usize,
    /// Width of the projection head
    pub output_size: usize,
    /// Number of stacked recurrent layers
    pub num_layers: usize,
    /// Weight initialization scheme
    pub weight_init: WeightInit,
}

/// Weight initialization scheme
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WeightInit {
    /// Uniform in `±1/sqrt(hidden_size)`
    ScaledUniform,
    /// Xavier/Glorot uniform
    Xavier,
    /// Normal distribution
    Normal { mean: f64, std: f64 },
    /// Uniform distribution
    Uniform { low: f64, high: f64 },
}

impl Default for WeightInit {
    fn default() -> Self {
        WeightInit::ScaledUniform
    }
}

impl WeightInit {
    /// Sample a `rows × cols` weight matrix.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rows: usize,
        cols: usize,
        hidden_size: usize,
        rng: &mut R,
    ) -> Result<Array2<f64>> {
        let shape = (rows, cols);
        let matrix = match *self {
            WeightInit::ScaledUniform => {
                let limit = (1.0 / hidden_size as f64).sqrt();
                Array2::random_using(shape, Uniform::new(-limit, limit), rng)
            }
            WeightInit::Xavier => {
                let limit = (6.0 / (rows + cols) as f64).sqrt();
                Array2::random_using(shape, Uniform::new(-limit, limit), rng)
            }
            WeightInit::Normal { mean, std } => {
                let dist = Normal::new(mean, std)
                    .map_err(|e| Error::InvalidConfiguration(format!("normal init: {}", e)))?;
                Array2::random_using(shape, dist, rng)
            }
            WeightInit::Uniform { low, high } => {
                if low >= high {
                    return Err(Error::InvalidConfiguration(format!(
                        "uniform init needs low < high, got [{}, {})",
                        low, high
                    )));
                }
                Array2::random_using(shape, Uniform::new(low, high), rng)
            }
        };
        Ok(matrix)
    }
}

impl NetworkConfig {
    /// Create a single-layer configuration
    ///
    /// # Arguments
    ///
    /// * `input_size` - Features per time step
    /// * `hidden_size` - Hidden state width
    /// * `output_size` - Projection head width
    pub fn new(input_size: usize, hidden_size: usize, output_size: usize) -> Self {
        Self {
            input_size,
            hidden_size,
            output_size,
            num_layers: 1,
            weight_init: WeightInit::default(),
        }
    }

    /// Set the number of stacked layers
    pub fn with_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers;
        self
    }

    /// Set the weight initialization
    pub fn with_weight_init(mut self, init: WeightInit) -> Self {
        self.weight_init = init;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("input_size", self.input_size),
            ("hidden_size", self.hidden_size),
            ("output_size", self.output_size),
            ("num_layers", self.num_layers),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfiguration(format!(
                    "{} must be positive",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::new(1, 16, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_config_builder() {
        let config = NetworkConfig::new(1, 32, 2)
            .with_layers(3)
            .with_weight_init(WeightInit::Xavier);

        assert_eq!(config.input_size, 1);
        assert_eq!(config.hidden_size, 32);
        assert_eq!(config.output_size, 2);
        assert_eq!(config.num_layers, 3);
        assert_eq!(config.weight_init, WeightInit::Xavier);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_sizes_rejected() {
        assert!(NetworkConfig::new(1, 0, 1).validate().is_err());
        assert!(NetworkConfig::new(1, 4, 1).with_layers(0).validate().is_err());
    }

    #[test]
    fn test_scaled_uniform_respects_limit() {
        let mut rng = StdRng::seed_from_u64(0);
        let w = WeightInit::ScaledUniform.sample(16, 4, 16, &mut rng).unwrap();
        assert_eq!(w.dim(), (16, 4));
        assert!(w.iter().all(|v| v.abs() <= 0.25));
    }

    #[test]
    fn test_seeded_init_is_reproducible() {
        let a = WeightInit::Xavier
            .sample(3, 5, 3, &mut StdRng::seed_from_u64(9))
            .unwrap();
        let b = WeightInit::Xavier
            .sample(3, 5, 3, &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bad_distributions_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let bad = WeightInit::Uniform {
            low: 1.0,
            high: 1.0,
        };
        assert!(bad.sample(2, 2, 2, &mut rng).is_err());
        let bad = WeightInit::Normal {
            mean: 0.0,
            std: -1.0,
        };
        assert!(bad.sample(2, 2, 2, &mut rng).is_err());
    }
}
