//! Standalone tensor creation functions.

use crate::error::TensorGradError;
use crate::tensor::Tensor;
use crate::types::DType;
use rand::Rng;
use rand_distr::StandardNormal;

/// Creates an f32 tensor of zeros with the given shape.
pub fn zeros(shape: &[usize]) -> Result<Tensor, TensorGradError> {
    let numel = shape.iter().product();
    Tensor::new(vec![0.0; numel], shape.to_vec())
}

/// Creates an f32 tensor of ones with the given shape.
pub fn ones(shape: &[usize]) -> Result<Tensor, TensorGradError> {
    full(shape, 1.0)
}

/// Creates an f32 tensor filled with `value`.
pub fn full(shape: &[usize], value: f32) -> Result<Tensor, TensorGradError> {
    let numel = shape.iter().product();
    Tensor::new(vec![value; numel], shape.to_vec())
}

/// Creates an f64 tensor filled with `value`.
pub fn full_f64(shape: &[usize], value: f64) -> Result<Tensor, TensorGradError> {
    let numel = shape.iter().product();
    Tensor::new_f64(vec![value; numel], shape.to_vec())
}

/// Zeros with the shape and dtype of `reference`.
pub fn zeros_like(reference: &Tensor) -> Result<Tensor, TensorGradError> {
    let shape = reference.shape();
    match reference.dtype() {
        DType::F32 => zeros(&shape),
        DType::F64 => full_f64(&shape, 0.0),
    }
}

/// Ones with the shape and dtype of `reference`.
pub fn ones_like(reference: &Tensor) -> Result<Tensor, TensorGradError> {
    let shape = reference.shape();
    match reference.dtype() {
        DType::F32 => ones(&shape),
        DType::F64 => full_f64(&shape, 1.0),
    }
}

/// Creates an f32 tensor with standard-normal samples drawn from `rng`.
pub fn randn<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Result<Tensor, TensorGradError> {
    let numel = shape.iter().product();
    let data: Vec<f32> = (0..numel).map(|_| rng.sample(StandardNormal)).collect();
    Tensor::new(data, shape.to_vec())
}

/// Creates an f64 tensor with standard-normal samples drawn from `rng`.
/// Preferred for gradient checking, where f32 rounding dominates the
/// finite-difference error.
pub fn randn_f64<R: Rng + ?Sized>(
    shape: &[usize],
    rng: &mut R,
) -> Result<Tensor, TensorGradError> {
    let numel = shape.iter().product();
    let data: Vec<f64> = (0..numel).map(|_| rng.sample(StandardNormal)).collect();
    Tensor::new_f64(data, shape.to_vec())
}
