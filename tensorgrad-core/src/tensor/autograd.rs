//! Autograd methods on [`Tensor`]: gradient accessors, the backward driver,
//! and gradient accumulation.

use crate::autograd::graph::{topological_sort, NodeId};
use crate::autograd::BackwardOp;
use crate::error::TensorGradError;
use crate::ops::arithmetic::add_op;
use crate::tensor::create::ones_like;
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

impl Tensor {
    /// Checks if the tensor requires gradient computation.
    pub fn requires_grad(&self) -> bool {
        self.read_data().requires_grad
    }

    /// Sets the `requires_grad` status of this tensor **in place**.
    ///
    /// Only allowed on leaf tensors: a non-leaf's flag is determined by its
    /// inputs at construction time and never changes afterwards.
    pub fn requires_grad_(&self, requires_grad: bool) -> Result<(), TensorGradError> {
        let mut guard = self.write_data();
        if guard.grad_fn.is_some() {
            return Err(TensorGradError::RequiresGradOnNonLeaf);
        }
        guard.requires_grad = requires_grad;
        Ok(())
    }

    /// Returns a clone of the accumulated gradient, if any.
    /// `None` means the all-zero accumulator.
    pub fn grad(&self) -> Option<Tensor> {
        self.read_data().grad.clone()
    }

    /// Returns the backward rule that produced this tensor, or `None` for a
    /// leaf. Together with [`BackwardOp::inputs`] and [`BackwardOp::name`]
    /// this is the read-only introspection surface for graph consumers.
    pub fn grad_fn(&self) -> Option<Arc<dyn BackwardOp + Send + Sync>> {
        self.read_data().grad_fn.clone()
    }

    /// True for a leaf node (no producing operation).
    pub fn is_leaf(&self) -> bool {
        self.read_data().grad_fn.is_none()
    }

    pub(crate) fn set_grad_fn(&self, grad_fn: Arc<dyn BackwardOp + Send + Sync>) {
        let mut guard = self.write_data();
        guard.grad_fn = Some(grad_fn);
        guard.requires_grad = true;
    }

    /// Resets the gradient accumulator to zero.
    ///
    /// `backward()` zeroes the nodes it reaches on its own; between training
    /// steps the *caller* must zero parameter gradients explicitly (usually
    /// through the optimizer), otherwise gradients silently accumulate
    /// across steps.
    pub fn zero_grad(&self) {
        self.write_data().grad = None;
    }

    /// A new tensor sharing this tensor's buffer but detached from the
    /// graph: no `grad_fn`, `requires_grad == false`.
    pub fn detach(&self) -> Tensor {
        let guard = self.read_data();
        Tensor::from_data(TensorData {
            buffer: guard.buffer.clone(),
            dtype: guard.dtype,
            shape: guard.shape.clone(),
            strides: guard.strides.clone(),
            offset: guard.offset,
            requires_grad: false,
            grad: None,
            grad_fn: None,
        })
    }

    /// Adds `grad_to_add` into this node's gradient accumulator.
    ///
    /// Additive, never overwriting: this is what makes fan-out (a node
    /// consumed by several operations) sum its contributions instead of
    /// keeping the last writer's.
    pub(crate) fn acc_grad(&self, grad_to_add: Tensor) -> Result<(), TensorGradError> {
        let expected_shape = self.shape();
        if grad_to_add.shape() != expected_shape {
            return Err(TensorGradError::GradientAccumulationShapeMismatch {
                expected: expected_shape,
                actual: grad_to_add.shape(),
            });
        }
        let existing = self.write_data().grad.take();
        let new_grad = match existing {
            Some(existing_grad) => add_op(&existing_grad, &grad_to_add)?,
            // An identity backward rule can hand the same gradient handle to
            // several inputs; store a fresh node so sibling accumulators
            // never alias. The buffer stays shared, which is safe: in-place
            // gradient updates replace the buffer, they do not mutate it.
            None => grad_to_add.detach(),
        };
        self.write_data().grad = Some(new_grad);
        Ok(())
    }

    /// Computes the gradients of this scalar tensor with respect to every
    /// gradient-requiring node reachable through the graph.
    ///
    /// Algorithm:
    /// 1. fail with `BackwardNonScalar` unless the tensor has exactly one
    ///    element (a non-scalar root has no unambiguous gradient seed);
    /// 2. if the root does not require grad there is nothing connected to a
    ///    trainable leaf — documented no-op;
    /// 3. zero the `grad` of every node reachable from this root (stale
    ///    values from a previous pass must not leak into this one);
    /// 4. seed the root with ones and walk the topological order in
    ///    reverse, draining per-node accumulated gradients and folding each
    ///    rule's contributions into its inputs. Inputs with
    ///    `requires_grad == false` are skipped.
    ///
    /// Afterwards each gradient-requiring node holds the true partial
    /// derivative of this tensor with respect to its value, summed over all
    /// paths.
    pub fn backward(&self) -> Result<(), TensorGradError> {
        if self.numel() != 1 {
            return Err(TensorGradError::BackwardNonScalar {
                shape: self.shape(),
            });
        }
        if !self.requires_grad() {
            log::debug!("backward() on a tensor with no grad-requiring ancestors: no-op");
            return Ok(());
        }

        let order = topological_sort(self)?;
        log::debug!("backward: traversing {} node(s)", order.len());

        // Reachable-only zeroing: grads accumulate within one pass, not
        // across passes.
        for node in &order {
            node.write_data().grad = None;
        }

        let mut pending: HashMap<NodeId, Tensor> = HashMap::new();
        pending.insert(self.node_id(), ones_like(self)?);

        for node in order.iter().rev() {
            let grad = match pending.remove(&node.node_id()) {
                Some(g) => g,
                None => continue, // no gradient flowed into this node
            };
            // The gradient of this node is final once every consumer has
            // contributed, which the reverse topological order guarantees.
            node.acc_grad(grad.clone())?;

            let grad_fn = match node.read_data().grad_fn.clone() {
                Some(g) => g,
                None => continue,
            };
            let input_grads = grad_fn.backward(&grad)?;
            let input_nodes = grad_fn.inputs();
            if input_grads.len() != input_nodes.len() {
                return Err(TensorGradError::InternalError(format!(
                    "backward rule '{}' returned {} gradients for {} inputs",
                    grad_fn.name(),
                    input_grads.len(),
                    input_nodes.len()
                )));
            }
            for (input_node, contribution) in input_nodes.into_iter().zip(input_grads) {
                let input = Tensor { data: input_node };
                if !input.requires_grad() {
                    continue;
                }
                let id = input.node_id();
                let merged = match pending.remove(&id) {
                    Some(existing) => add_op(&existing, &contribution)?,
                    None => contribution,
                };
                pending.insert(id, merged);
            }
        }
        Ok(())
    }
}
