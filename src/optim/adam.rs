//! Adam optimizer
//!
//! The parameter update multiplies the usual Adam ratio by the clipped raw
//! gradient:
//!
//! ```text
//! θ -= α_t · m̂ / (sqrt(v̂) + ε) · clip(g)
//! α_t = lr · sqrt(1 - β2^t) / (1 - β1^t)
//! ```
//!
//! The extra `clip(g)` factor damps the step a second time. Detection results
//! downstream are calibrated against this exact rule, so it is kept as is.

use super::{clip_value, Parameters};
use crate::error::{Error, Result};
use ndarray::{ArrayD, Zip};
use serde::{Deserialize, Serialize};

/// Adam hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    /// Decay rate of the first moment
    pub beta1: f64,
    /// Decay rate of the second moment
    pub beta2: f64,
    /// Denominator floor
    pub epsilon: f64,
    /// Gradient components are clamped to `[-clip_value, clip_value]`
    pub clip_value: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            clip_value: 5.0,
        }
    }
}

impl AdamConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return Err(Error::InvalidConfiguration(format!(
                "Adam betas must lie in [0, 1), got {} and {}",
                self.beta1, self.beta2
            )));
        }
        if self.epsilon <= 0.0 || self.clip_value <= 0.0 {
            return Err(Error::InvalidConfiguration(
                "Adam epsilon and clip value must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// First and second moment accumulators, one pair per parameter tensor.
#[derive(Debug, Clone)]
struct Moments {
    m: Vec<ArrayD<f64>>,
    v: Vec<ArrayD<f64>>,
}

/// Adam optimizer state for a single model
#[derive(Debug, Clone)]
pub struct Adam {
    config: AdamConfig,
    moments: Option<Moments>,
    t: u64,
}

impl Adam {
    pub fn new(config: AdamConfig) -> Self {
        Self {
            config,
            moments: None,
            t: 0,
        }
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.moments.is_some()
    }

    /// Number of updates applied since the last initialization
    pub fn step_count(&self) -> u64 {
        self.t
    }

    /// Allocate zeroed moments shaped like `params` and reset the step counter.
    pub fn init<P: Parameters + ?Sized>(&mut self, params: &P) {
        let zeros: Vec<ArrayD<f64>> = params
            .tensors()
            .iter()
            .map(|t| ArrayD::zeros(t.raw_dim()))
            .collect();
        self.moments = Some(Moments {
            m: zeros.clone(),
            v: zeros,
        });
        self.t = 0;
    }

    /// Allocate moments on first use; later calls keep the accumulated state.
    pub fn ensure_initialized<P: Parameters + ?Sized>(&mut self, params: &P) {
        if !self.is_initialized() {
            self.init(params);
        }
    }

    /// Apply one update to `params` using `grads`.
    ///
    /// Shapes are checked before anything is mutated, so a failed call leaves
    /// both the parameters and the step counter untouched.
    pub fn step<P, G>(&mut self, params: &mut P, grads: &G, learning_rate: f64) -> Result<()>
    where
        P: Parameters + ?Sized,
        G: Parameters + ?Sized,
    {
        let moments = self.moments.as_mut().ok_or(Error::UninitializedOptimizer)?;
        let grad_tensors = grads.tensors();
        let mut param_tensors = params.tensors_mut();

        if param_tensors.len() != moments.m.len() {
            return Err(Error::dimension(
                "adam parameter tensors",
                moments.m.len(),
                param_tensors.len(),
            ));
        }
        if grad_tensors.len() != param_tensors.len() {
            return Err(Error::dimension(
                "adam gradient tensors",
                param_tensors.len(),
                grad_tensors.len(),
            ));
        }
        for ((p, g), m) in param_tensors.iter().zip(&grad_tensors).zip(&moments.m) {
            if p.shape() != m.shape() {
                return Err(Error::dimension("adam parameter shape", m.len(), p.len()));
            }
            if g.shape() != p.shape() {
                return Err(Error::dimension("adam gradient shape", p.len(), g.len()));
            }
        }

        self.t += 1;
        let AdamConfig {
            beta1,
            beta2,
            epsilon,
            clip_value: clip,
        } = self.config;
        let t = self.t as f64;
        let bias_correction1 = 1.0 - beta1.powf(t);
        let bias_correction2 = 1.0 - beta2.powf(t);
        let alpha_t = learning_rate * bias_correction2.sqrt() / bias_correction1;

        for (((param, grad), m), v) in param_tensors
            .iter_mut()
            .zip(&grad_tensors)
            .zip(moments.m.iter_mut())
            .zip(moments.v.iter_mut())
        {
            Zip::from(param)
                .and(grad)
                .and(m)
                .and(v)
                .for_each(|p, &g, m, v| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    let m_hat = *m / bias_correction1;
                    let v_hat = *v / bias_correction2;
                    *p -= alpha_t * m_hat / (v_hat.sqrt() + epsilon) * clip_value(g, clip);
                });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1, ArrayViewD, ArrayViewMutD};

    #[derive(Clone)]
    struct Flat(Array1<f64>);

    impl Parameters for Flat {
        fn tensors(&self) -> Vec<ArrayViewD<'_, f64>> {
            vec![self.0.view().into_dyn()]
        }

        fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
            vec![self.0.view_mut().into_dyn()]
        }
    }

    #[test]
    fn test_step_before_init_fails() {
        let mut adam = Adam::new(AdamConfig::default());
        let mut params = Flat(array![1.0, 2.0]);
        let grads = Flat(array![0.1, 0.1]);
        let err = adam.step(&mut params, &grads, 0.01).unwrap_err();
        assert!(matches!(err, Error::UninitializedOptimizer));
        assert_eq!(adam.step_count(), 0);
    }

    #[test]
    fn test_zero_gradient_leaves_parameters() {
        let mut adam = Adam::new(AdamConfig::default());
        let mut params = Flat(array![0.3, -1.2, 4.0]);
        let original = params.0.clone();
        let grads = Flat(Array1::zeros(3));
        adam.init(&params);

        for _ in 0..100 {
            adam.step(&mut params, &grads, 0.1).unwrap();
        }

        assert_eq!(params.0, original);
        assert_eq!(adam.step_count(), 100);
    }

    #[test]
    fn test_constant_gradient_step_approaches_learning_rate() {
        let lr = 0.01;
        let mut adam = Adam::new(AdamConfig::default());
        let mut params = Flat(array![0.0]);
        let grads = Flat(array![1.0]);
        adam.init(&params);

        let mut last_step = 0.0;
        for _ in 0..10_000 {
            let before = params.0[0];
            adam.step(&mut params, &grads, lr).unwrap();
            last_step = before - params.0[0];
        }

        assert_relative_eq!(last_step, lr, max_relative = 1e-3);
    }

    #[test]
    fn test_update_matches_closed_form() {
        let cfg = AdamConfig::default();
        let mut adam = Adam::new(cfg);
        let mut params = Flat(array![1.0]);
        let grads = Flat(array![8.0]);
        adam.init(&params);
        adam.step(&mut params, &grads, 0.1).unwrap();

        // t = 1: m̂ = g, v̂ = g², α_1 = lr·sqrt(1-β2)/(1-β1), clipped factor = 5
        let alpha = 0.1 * (1.0 - cfg.beta2).sqrt() / (1.0 - cfg.beta1);
        let expected = 1.0 - alpha * 8.0 / (8.0 + cfg.epsilon) * 5.0;
        assert_relative_eq!(params.0[0], expected, max_relative = 1e-12);
    }

    #[test]
    fn test_shape_mismatch_is_rejected_without_side_effects() {
        let mut adam = Adam::new(AdamConfig::default());
        let mut params = Flat(array![1.0, 2.0]);
        adam.init(&params);
        let grads = Flat(array![1.0, 2.0, 3.0]);

        let err = adam.step(&mut params, &grads, 0.1).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
        assert_eq!(adam.step_count(), 0);
        assert_eq!(params.0, array![1.0, 2.0]);
    }

    #[test]
    fn test_ensure_initialized_keeps_state() {
        let mut adam = Adam::new(AdamConfig::default());
        let mut params = Flat(array![1.0]);
        adam.ensure_initialized(&params);
        adam.step(&mut params, &Flat(array![1.0]), 0.1).unwrap();
        adam.ensure_initialized(&params);
        assert_eq!(adam.step_count(), 1);

        adam.init(&params);
        assert_eq!(adam.step_count(), 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(AdamConfig::default().validate().is_ok());
        let bad = AdamConfig {
            beta1: 1.0,
            ..AdamConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
