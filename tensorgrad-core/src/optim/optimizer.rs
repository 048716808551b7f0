use crate::error::TensorGradError;

/// Common interface of all optimizers.
pub trait Optimizer {
    /// Applies one update step to every managed parameter using the
    /// gradients currently stored on them. Parameters without an
    /// accumulated gradient are left untouched.
    fn step(&mut self) -> Result<(), TensorGradError>;

    /// Resets the gradient accumulator of every managed parameter.
    /// Call between training steps, after [`Optimizer::step`].
    fn zero_grad(&mut self);
}
