//! Reverse-mode automatic differentiation over dynamically built tensor
//! graphs.
//!
//! Operations execute eagerly on the forward pass while recording, per
//! output tensor, a backward rule and strong references to its inputs.
//! Calling [`Tensor::backward`] on a scalar result walks the recorded graph
//! in reverse topological order and accumulates `∂output/∂node` into every
//! gradient-requiring node it reaches; the optimizers in [`optim`] then
//! consume those gradients to update parameter leaves in place.
//!
//! ```
//! use tensorgrad_core::Tensor;
//!
//! let x = Tensor::new(vec![3.0], vec![1])?;
//! x.requires_grad_(true)?;
//! let y = x.relu()?.sum()?;
//! y.backward()?;
//! assert_eq!(x.grad().unwrap().get_f32_data()?, vec![1.0]);
//! # Ok::<(), tensorgrad_core::TensorGradError>(())
//! ```

pub mod autograd;
pub mod buffer;
pub mod error;
pub mod nn;
pub mod ops;
pub mod optim;
pub mod tensor;
pub mod tensor_data;
pub mod types;

pub use error::TensorGradError;
pub use tensor::Tensor;
pub use types::DType;
