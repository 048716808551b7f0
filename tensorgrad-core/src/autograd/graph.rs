use crate::error::TensorGradError;
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Stable identity of a graph node.
///
/// `Tensor` handles are cheap clones of `Arc<RwLock<TensorData>>`, so the
/// pointer to the shared `RwLock` identifies the node regardless of how many
/// handles exist. Valid as a map/set key for as long as some `Arc` keeps the
/// node alive — which the traversal result itself guarantees.
pub type NodeId = *const RwLock<TensorData>;

impl Tensor {
    /// Identity of the node this handle refers to.
    pub fn node_id(&self) -> NodeId {
        Arc::as_ptr(&self.data)
    }
}

/// Topological sort of the graph reachable from `root` through `grad_fn`
/// input edges.
///
/// Depth-first post-order: a node is appended after all nodes it depends on,
/// so every parent precedes every child and `root` comes last. Shared
/// sub-expressions (diamond dependencies) are visited exactly once via a
/// visited set keyed by [`NodeId`].
///
/// The construction contract makes cycles impossible (an operation can only
/// reference already-existing nodes); a cycle therefore indicates a builder
/// bug, and is reported as `CycleDetected` instead of hanging.
pub fn topological_sort(root: &Tensor) -> Result<Vec<Tensor>, TensorGradError> {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut on_stack: HashSet<NodeId> = HashSet::new();
    let mut sorted: Vec<Tensor> = Vec::new();
    visit(root, &mut visited, &mut on_stack, &mut sorted)?;
    Ok(sorted)
}

fn visit(
    node: &Tensor,
    visited: &mut HashSet<NodeId>,
    on_stack: &mut HashSet<NodeId>,
    sorted: &mut Vec<Tensor>,
) -> Result<(), TensorGradError> {
    let id = node.node_id();
    if visited.contains(&id) {
        return Ok(());
    }
    if !on_stack.insert(id) {
        return Err(TensorGradError::CycleDetected);
    }
    let grad_fn = node.read_data().grad_fn.clone();
    if let Some(grad_fn) = grad_fn {
        for input in grad_fn.inputs() {
            let input_tensor = Tensor { data: input };
            visit(&input_tensor, visited, on_stack, sorted)?;
        }
    }
    on_stack.remove(&id);
    visited.insert(id);
    sorted.push(node.clone());
    Ok(())
}

/// Collects the leaf nodes with `requires_grad == true` reachable from
/// `root`, in deterministic traversal order.
///
/// This is the parameter-discovery half of the optimizer update protocol:
/// after `backward()`, each returned tensor carries its fully accumulated
/// gradient.
pub fn collect_parameters(root: &Tensor) -> Result<Vec<Tensor>, TensorGradError> {
    let sorted = topological_sort(root)?;
    Ok(sorted
        .into_iter()
        .filter(|t| {
            let guard = t.read_data();
            guard.grad_fn.is_none() && guard.requires_grad
        })
        .collect())
}
