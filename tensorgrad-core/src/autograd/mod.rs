//! Reverse-mode autodiff plumbing: the [`BackwardOp`] rule interface, the
//! topological scheduler over the implicit graph, and the finite-difference
//! gradient checker.

pub mod backward_op;
pub mod grad_check;
pub mod graph;

pub use backward_op::BackwardOp;
pub use grad_check::{check_grad, GradCheckError};
pub use graph::{collect_parameters, topological_sort, NodeId};
