use crate::error::TensorGradError;
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

/// Interface for the backward rule of a differentiable tensor operation.
///
/// Every operation that produces a gradient-requiring tensor stores one of
/// these in the output's `grad_fn` field. The implementation captures strong
/// references to the operation's inputs (and whatever forward-time values
/// the derivative formula needs), so the sub-graph behind a live output
/// handle stays alive for the backward pass without any manual lifetime
/// tracking.
///
/// `Debug + Send + Sync` are required because the `Arc<dyn BackwardOp>` is
/// part of `TensorData`, which is shared behind `Arc<RwLock<..>>`.
pub trait BackwardOp: Debug + Send + Sync {
    /// Computes dL/dInput_i for each input, given dL/dOutput.
    ///
    /// `grad_output` has the shape of the operation's output. Each returned
    /// gradient **must** have the shape of the corresponding input — when
    /// the forward pass broadcast an input, the rule reduces the gradient
    /// back with [`Tensor::reduce_to_shape`]. Order must match `inputs()`.
    ///
    /// Rules compute on detached tensors: invoking them never extends the
    /// graph.
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, TensorGradError>;

    /// The input nodes that participated in the forward operation, in the
    /// same order as the gradients returned by `backward()`.
    ///
    /// Strong references are returned; the backward driver derives node
    /// identities from them with `Arc::as_ptr`.
    fn inputs(&self) -> Vec<Arc<RwLock<TensorData>>>;

    /// Human-readable operation tag, for graph introspection and Debug
    /// output (e.g. `"add"`, `"matmul"`, `"relu"`).
    fn name(&self) -> &'static str;
}
