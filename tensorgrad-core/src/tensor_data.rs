use std::sync::Arc;

use crate::autograd::BackwardOp;
use crate::buffer::Buffer;
use crate::error::TensorGradError;
use crate::tensor::utils::calculate_strides;
use crate::tensor::Tensor;
use crate::types::DType;

/// Internal storage and metadata for a [`Tensor`] — one vertex of the
/// computation graph.
///
/// Holds the forward value (`buffer`), the shape/stride metadata, and the
/// autograd bookkeeping: the accumulated gradient and the backward rule that
/// links this node to the operation inputs that produced it. It is wrapped
/// in `Arc<RwLock<TensorData>>` by `Tensor` for shared ownership and
/// interior mutability.
#[derive(Debug)]
pub struct TensorData {
    /// The underlying typed data buffer, shared via `Arc` (detach, internal
    /// reshapes) without copying.
    pub(crate) buffer: Buffer,
    /// The data type of the elements in the buffer.
    pub(crate) dtype: DType,

    /// The shape (dimensions) of the tensor.
    pub(crate) shape: Vec<usize>,
    /// Memory step per dimension. `len(strides) == len(shape)` always holds.
    pub(crate) strides: Vec<usize>,
    /// Offset into the buffer of the first element.
    pub(crate) offset: usize,

    /// Whether gradients should be tracked through this node. Set on a leaf
    /// by the user; propagated as OR over inputs by every operation.
    pub(crate) requires_grad: bool,
    /// Accumulated gradient, same shape as the tensor. `None` encodes the
    /// all-zero accumulator; backward contributions are *added*, never
    /// overwritten.
    pub(crate) grad: Option<Tensor>,
    /// Backward rule of the operation that produced this node, together with
    /// strong references to its inputs. `None` marks a leaf.
    pub(crate) grad_fn: Option<Arc<dyn BackwardOp + Send + Sync>>,
}

impl TensorData {
    /// Creates a new f32 `TensorData` with contiguous strides.
    ///
    /// # Errors
    /// Returns `TensorGradError::TensorCreationError` if the data length does
    /// not match the number of elements implied by `shape`.
    pub fn new(data_vec: Vec<f32>, shape: Vec<usize>) -> Result<Self, TensorGradError> {
        let numel: usize = shape.iter().product();
        if data_vec.len() != numel {
            return Err(TensorGradError::TensorCreationError {
                data_len: data_vec.len(),
                shape,
            });
        }
        let strides = calculate_strides(&shape);
        Ok(TensorData {
            buffer: Buffer::F32(Arc::new(data_vec)),
            dtype: DType::F32,
            offset: 0,
            shape,
            strides,
            requires_grad: false,
            grad: None,
            grad_fn: None,
        })
    }

    /// Creates a new f64 `TensorData` with contiguous strides.
    pub fn new_f64(data_vec: Vec<f64>, shape: Vec<usize>) -> Result<Self, TensorGradError> {
        let numel: usize = shape.iter().product();
        if data_vec.len() != numel {
            return Err(TensorGradError::TensorCreationError {
                data_len: data_vec.len(),
                shape,
            });
        }
        let strides = calculate_strides(&shape);
        Ok(TensorData {
            buffer: Buffer::F64(Arc::new(data_vec)),
            dtype: DType::F64,
            offset: 0,
            shape,
            strides,
            requires_grad: false,
            grad: None,
            grad_fn: None,
        })
    }

    /// Provides access to the underlying shared data buffer.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Number of logical elements.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Checks whether the elements are laid out in standard row-major order
    /// without gaps.
    pub fn is_contiguous(&self) -> bool {
        if self.shape.is_empty() {
            return true;
        }
        let mut current_stride = 1;
        for i in (0..self.shape.len()).rev() {
            let shape_i = self.shape[i];
            if shape_i == 0 {
                return true;
            }
            if shape_i != 1 {
                if self.strides[i] != current_stride {
                    return false;
                }
                current_stride *= shape_i;
            }
        }
        true
    }
}
