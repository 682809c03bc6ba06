//! Dense vector and matrix primitives
//!
//! Thin, shape-checked wrappers over `ndarray`. Every function is pure; a shape
//! disagreement is reported as [`Error::DimensionMismatch`] instead of being
//! broadcast or truncated.

use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Matrix-vector product `M · v`.
pub fn matrix_vector_mul(matrix: ArrayView2<f64>, vec: ArrayView1<f64>) -> Result<Array1<f64>> {
    if matrix.ncols() != vec.len() {
        return Err(Error::dimension("matrix_vector_mul", matrix.ncols(), vec.len()));
    }
    Ok(matrix.dot(&vec))
}

/// Transposed product `Mᵀ · v` without materializing the transpose.
pub fn matrix_vector_mul_transpose(
    matrix: ArrayView2<f64>,
    vec: ArrayView1<f64>,
) -> Result<Array1<f64>> {
    if matrix.nrows() != vec.len() {
        return Err(Error::dimension(
            "matrix_vector_mul_transpose",
            matrix.nrows(),
            vec.len(),
        ));
    }
    Ok(matrix.t().dot(&vec))
}

/// Owned transpose.
pub fn transpose(matrix: ArrayView2<f64>) -> Array2<f64> {
    matrix.t().to_owned()
}

fn check_same_len(context: &'static str, a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> Result<()> {
    if a.len() != b.len() {
        return Err(Error::dimension(context, a.len(), b.len()));
    }
    Ok(())
}

/// Elementwise `a + b`.
pub fn elementwise_add(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Result<Array1<f64>> {
    check_same_len("elementwise_add", &a, &b)?;
    Ok(&a + &b)
}

/// Elementwise `a - b`.
pub fn elementwise_sub(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Result<Array1<f64>> {
    check_same_len("elementwise_sub", &a, &b)?;
    Ok(&a - &b)
}

/// Elementwise (Hadamard) product `a ⊙ b`.
pub fn elementwise_mul(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Result<Array1<f64>> {
    check_same_len("elementwise_mul", &a, &b)?;
    Ok(&a * &b)
}

/// Scale every element by a constant.
pub fn scale(vec: ArrayView1<f64>, factor: f64) -> Array1<f64> {
    vec.mapv(|v| v * factor)
}

/// Dot product.
pub fn dot(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Result<f64> {
    check_same_len("dot", &a, &b)?;
    Ok(a.dot(&b))
}

/// Outer product `a ⊗ b`, shape `len(a) × len(b)`.
pub fn outer_product(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Array2<f64> {
    let col = a.insert_axis(ndarray::Axis(1));
    let row = b.insert_axis(ndarray::Axis(0));
    col.dot(&row)
}

/// Elementwise matrix sum.
pub fn matrix_add(a: ArrayView2<f64>, b: ArrayView2<f64>) -> Result<Array2<f64>> {
    if a.dim() != b.dim() {
        return Err(Error::dimension("matrix_add", a.len(), b.len()));
    }
    Ok(&a + &b)
}

/// Mean squared error, averaged over the element count.
pub fn mse_loss(output: ArrayView1<f64>, target: ArrayView1<f64>) -> Result<f64> {
    check_same_len("mse_loss", &output, &target)?;
    if output.is_empty() {
        return Err(Error::EmptyInput("mse_loss"));
    }
    let n = output.len() as f64;
    Ok(output
        .iter()
        .zip(target.iter())
        .map(|(o, t)| (o - t).powi(2))
        .sum::<f64>()
        / n)
}

/// Gradient of [`mse_loss`] with respect to `output`: `2 (output - target) / n`.
pub fn mse_loss_gradient(output: ArrayView1<f64>, target: ArrayView1<f64>) -> Result<Array1<f64>> {
    check_same_len("mse_loss_gradient", &output, &target)?;
    if output.is_empty() {
        return Err(Error::EmptyInput("mse_loss_gradient"));
    }
    let n = output.len() as f64;
    Ok((&output - &target).mapv(|d| 2.0 * d / n))
}

/// One supervised sample cut from a flat series.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// `lookback_len` consecutive values
    pub input: Vec<f64>,
    /// The `horizon` values that follow `input`
    pub target: Vec<f64>,
}

/// Cut a series into aligned (input, target) windows.
///
/// Window `k` covers `data[k..k + lookback]` and targets the following `horizon`
/// values, so consecutive windows overlap by `lookback - 1` elements. With
/// `horizon == 1` a series of length `L` yields `L - lookback` windows; a series
/// too short for a single window yields none.
pub fn sliding_windows(data: &[f64], lookback: usize, horizon: usize) -> Result<Vec<Window>> {
    if lookback == 0 || horizon == 0 {
        return Err(Error::InvalidConfiguration(format!(
            "sliding window needs positive lookback and horizon, got {} and {}",
            lookback, horizon
        )));
    }
    if data.len() < lookback + horizon {
        return Ok(Vec::new());
    }

    let count = data.len() - lookback - horizon + 1;
    Ok((0..count)
        .map(|start| Window {
            input: data[start..start + lookback].to_vec(),
            target: data[start + lookback..start + lookback + horizon].to_vec(),
        })
        .collect())
}
