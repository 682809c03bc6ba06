//! Gate activation functions
//!
//! Derivatives are expressed in terms of the activation value itself, which is
//! what the backward pass has cached.

use ndarray::{Array1, ArrayView1};

/// Logistic sigmoid, evaluated without overflowing for large |x|.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// d/dx sigmoid at activation `s = sigmoid(x)`.
pub fn sigmoid_derivative(s: f64) -> f64 {
    s * (1.0 - s)
}

/// d/dx tanh at activation `t = tanh(x)`.
pub fn tanh_derivative(t: f64) -> f64 {
    1.0 - t * t
}

pub fn sigmoid_vec(x: ArrayView1<f64>) -> Array1<f64> {
    x.mapv(sigmoid)
}

pub fn tanh_vec(x: ArrayView1<f64>) -> Array1<f64> {
    x.mapv(f64::tanh)
}
