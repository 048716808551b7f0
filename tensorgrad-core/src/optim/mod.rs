//! Gradient-based parameter update rules.
//!
//! Optimizers hold handles to parameter leaves, read the gradients a
//! backward pass accumulated on them, and write updated values back into
//! the leaves in place. A parameter whose gradient accumulator is still
//! `None` is skipped: zero gradient means no update.

pub mod adamw;
pub mod grad_clipping;
pub mod optimizer;
pub mod sgd;

pub use adamw::{AdamW, AdamWConfig};
pub use grad_clipping::{clip_grad_norm_, clip_grad_value_};
pub use optimizer::Optimizer;
pub use sgd::Sgd;
