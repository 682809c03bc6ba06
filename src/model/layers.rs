//! Dense projection head

use super::config::WeightInit;
use crate::error::{Error, Result};
use crate::linalg::{matrix_vector_mul, matrix_vector_mul_transpose, outer_product};
use crate::optim::Parameters;
use ndarray::{Array1, Array2, ArrayView1, ArrayViewD, ArrayViewMutD};
use rand::Rng;

/// Fully connected layer `y = W·x + b`
#[derive(Debug, Clone, PartialEq)]
pub struct Dense {
    /// `[output_size][input_size]`
    pub weights: Array2<f64>,
    pub biases: Array1<f64>,
}

impl Dense {
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        init: WeightInit,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Self {
            weights: init.sample(output_size, input_size, input_size, rng)?,
            biases: Array1::zeros(output_size),
        })
    }

    pub fn zeros(input_size: usize, output_size: usize) -> Self {
        Self {
            weights: Array2::zeros((output_size, input_size)),
            biases: Array1::zeros(output_size),
        }
    }

    pub fn zeros_like(&self) -> Self {
        let (rows, cols) = self.weights.dim();
        Self::zeros(cols, rows)
    }

    pub fn input_size(&self) -> usize {
        self.weights.ncols()
    }

    pub fn output_size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn forward(&self, x: ArrayView1<f64>) -> Result<Array1<f64>> {
        Ok(matrix_vector_mul(self.weights.view(), x)? + &self.biases)
    }

    /// Returns the parameter gradients and the gradient with respect to `x`.
    pub fn backward(&self, x: ArrayView1<f64>, d_out: ArrayView1<f64>) -> Result<(Dense, Array1<f64>)> {
        if d_out.len() != self.output_size() {
            return Err(Error::dimension("dense output gradient", self.output_size(), d_out.len()));
        }
        if x.len() != self.input_size() {
            return Err(Error::dimension("dense input", self.input_size(), x.len()));
        }
        let grads = Dense {
            weights: outer_product(d_out, x),
            biases: d_out.to_owned(),
        };
        let dx = matrix_vector_mul_transpose(self.weights.view(), d_out)?;
        Ok((grads, dx))
    }
}

impl Parameters for Dense {
    fn tensors(&self) -> Vec<ArrayViewD<'_, f64>> {
        vec![self.weights.view().into_dyn(), self.biases.view().into_dyn()]
    }

    fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
        vec![
            self.weights.view_mut().into_dyn(),
            self.biases.view_mut().into_dyn(),
        ]
    }
}
