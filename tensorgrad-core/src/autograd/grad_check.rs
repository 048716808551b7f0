//! Numerical verification of backward rules.
//!
//! [`check_grad`] compares the analytical gradients produced by a backward
//! pass against central finite differences of the same scalar loss. Every
//! backward rule in this crate is expected to have at least one test going
//! through it.

use crate::error::TensorGradError;
use crate::tensor::Tensor;
use thiserror::Error;

/// Error type specifically for gradient checking failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradCheckError {
    #[error("gradient mismatch for input {input_index}, element {element_index}: analytical {analytical_grad} != numerical {numerical_grad} (difference {difference})")]
    GradientMismatch {
        input_index: usize,
        element_index: usize,
        analytical_grad: f64,
        numerical_grad: f64,
        difference: f64,
    },
    #[error("forward function failed during gradient check: {0}")]
    ForwardPassError(TensorGradError),
    #[error("backward pass failed during gradient check: {0}")]
    BackwardPassError(TensorGradError),
    #[error("input {input_index} requires grad but has no gradient after backward")]
    MissingAnalyticalGrad { input_index: usize },
    #[error("numerical gradient is not finite for input {input_index}, element {element_index} (loss+ {loss_plus}, loss- {loss_minus})")]
    NumericalGradNotFinite {
        input_index: usize,
        element_index: usize,
        loss_plus: f64,
        loss_minus: f64,
    },
    #[error("analytical gradient is not finite for input {input_index}, element {element_index}: {value}")]
    AnalyticalGradNotFinite {
        input_index: usize,
        element_index: usize,
        value: f64,
    },
    #[error("gradient check inputs must be leaf tensors (input {input_index} has a grad_fn)")]
    InputNotLeaf { input_index: usize },
    #[error("gradient check requires contiguous inputs (input {input_index})")]
    NonContiguousInput { input_index: usize },
    #[error("tensor error during gradient check: {0}")]
    TensorError(TensorGradError),
}

impl From<TensorGradError> for GradCheckError {
    fn from(err: TensorGradError) -> Self {
        GradCheckError::TensorError(err)
    }
}

/// Checks analytical gradients against central finite differences.
///
/// `func` must map the given leaf tensors to a scalar loss. The analytical
/// gradients are produced by one backward pass; each input element is then
/// perturbed by `±epsilon` and the loss re-evaluated, all in f64. An element
/// fails when the difference exceeds `tolerance` both absolutely and
/// relative to the gradient magnitudes.
pub fn check_grad<F>(
    func: F,
    inputs: &[Tensor],
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError>
where
    F: Fn(&[Tensor]) -> Result<Tensor, TensorGradError>,
{
    for (i, input) in inputs.iter().enumerate() {
        if !input.is_contiguous() {
            return Err(GradCheckError::NonContiguousInput { input_index: i });
        }
        if input.grad_fn().is_some() {
            return Err(GradCheckError::InputNotLeaf { input_index: i });
        }
    }

    // One analytical backward pass.
    let loss = func(inputs).map_err(GradCheckError::ForwardPassError)?;
    loss.backward().map_err(GradCheckError::BackwardPassError)?;

    let mut analytical: Vec<Option<Vec<f64>>> = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        if !input.requires_grad() {
            analytical.push(None);
            continue;
        }
        let grad = input
            .grad()
            .ok_or(GradCheckError::MissingAnalyticalGrad { input_index: i })?;
        let values = grad.to_f64_vec()?;
        for (j, &v) in values.iter().enumerate() {
            if !v.is_finite() {
                return Err(GradCheckError::AnalyticalGradNotFinite {
                    input_index: i,
                    element_index: j,
                    value: v,
                });
            }
        }
        analytical.push(Some(values));
    }

    for (i, input) in inputs.iter().enumerate() {
        let Some(analytical_grads) = &analytical[i] else {
            continue;
        };
        let original = input.to_f64_vec()?;

        for j in 0..original.len() {
            let mut perturbed = original.clone();
            perturbed[j] = original[j] + epsilon;
            input.set_data_from_f64(perturbed)?;
            let loss_plus = func(inputs)
                .map_err(GradCheckError::ForwardPassError)?
                .item_f64()?;

            let mut perturbed = original.clone();
            perturbed[j] = original[j] - epsilon;
            input.set_data_from_f64(perturbed)?;
            let loss_minus = func(inputs)
                .map_err(GradCheckError::ForwardPassError)?
                .item_f64()?;

            input.set_data_from_f64(original.clone())?;

            let numerical = (loss_plus - loss_minus) / (2.0 * epsilon);
            if !numerical.is_finite() {
                return Err(GradCheckError::NumericalGradNotFinite {
                    input_index: i,
                    element_index: j,
                    loss_plus,
                    loss_minus,
                });
            }

            let analytical_grad = analytical_grads[j];
            let difference = (analytical_grad - numerical).abs();
            let scale = analytical_grad.abs() + numerical.abs();
            if difference > tolerance && difference > tolerance * scale {
                return Err(GradCheckError::GradientMismatch {
                    input_index: i,
                    element_index: j,
                    analytical_grad,
                    numerical_grad: numerical,
                    difference,
                });
            }
        }
    }
    Ok(())
}
