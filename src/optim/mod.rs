//! Optimizers for the recurrent models
//!
//! Parameters and gradients share one layout: anything implementing
//! [`Parameters`] hands out its tensors in a fixed order, and the optimizer
//! walks parameters and gradients side by side.

mod adam;

pub use adam::{Adam, AdamConfig};

use ndarray::{ArrayViewD, ArrayViewMutD};

/// A set of trainable tensors visited in a stable order.
pub trait Parameters {
    /// Read-only views over every tensor.
    fn tensors(&self) -> Vec<ArrayViewD<'_, f64>>;

    /// Mutable views over every tensor, same order as [`Parameters::tensors`].
    fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>>;

    /// Total number of scalar parameters
    fn num_parameters(&self) -> usize {
        self.tensors().iter().map(|t| t.len()).sum()
    }

    /// Clamp every component to `[-bound, bound]`.
    fn clip(&mut self, bound: f64) {
        for mut tensor in self.tensors_mut() {
            tensor.mapv_inplace(|g| clip_value(g, bound));
        }
    }

    /// Largest absolute component, 0 for an empty set.
    fn max_abs(&self) -> f64 {
        self.tensors()
            .iter()
            .flat_map(|t| t.iter().map(|v| v.abs()).collect::<Vec<_>>())
            .fold(0.0, f64::max)
    }
}

/// Clamp a single gradient component.
pub fn clip_value(grad: f64, bound: f64) -> f64 {
    grad.clamp(-bound, bound)
}
