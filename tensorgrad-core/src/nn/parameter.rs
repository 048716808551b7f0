use crate::error::TensorGradError;
use crate::tensor::create::randn;
use crate::tensor::Tensor;
use rand::Rng;
use std::ops::Deref;

/// A trainable leaf tensor.
///
/// Wrapping a tensor in `Parameter` marks it as something an optimizer
/// should update: `requires_grad` is forced on at construction. `Deref`
/// makes every `Tensor` method available directly.
#[derive(Debug, Clone)]
pub struct Parameter {
    tensor: Tensor,
}

impl Parameter {
    /// Wraps a leaf tensor, enabling gradient tracking on it.
    ///
    /// # Errors
    /// `RequiresGradOnNonLeaf` if the tensor was produced by an operation.
    pub fn new(tensor: Tensor) -> Result<Self, TensorGradError> {
        tensor.requires_grad_(true)?;
        Ok(Parameter { tensor })
    }

    /// A parameter initialized from the standard normal distribution.
    pub fn randn<R: Rng>(shape: &[usize], rng: &mut R) -> Result<Self, TensorGradError> {
        Parameter::new(randn(shape, rng)?)
    }

    /// The underlying tensor handle (same graph node).
    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }
}

impl Deref for Parameter {
    type Target = Tensor;

    fn deref(&self) -> &Tensor {
        &self.tensor
    }
}
