use crate::error::TensorGradError;
use crate::types::DType;
use std::sync::Arc;

/// Typed CPU storage behind a tensor.
///
/// The data `Vec` is wrapped in an `Arc` so detached tensors and internal
/// reshapes can share the allocation without copying it.
#[derive(Debug, Clone)]
pub enum Buffer {
    F32(Arc<Vec<f32>>),
    F64(Arc<Vec<f64>>),
}

impl Buffer {
    /// The data type of the elements held by this buffer.
    pub fn dtype(&self) -> DType {
        match self {
            Buffer::F32(_) => DType::F32,
            Buffer::F64(_) => DType::F64,
        }
    }

    /// Number of elements physically present in the buffer.
    pub fn len(&self) -> usize {
        match self {
            Buffer::F32(v) => v.len(),
            Buffer::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the underlying f32 storage, or a `DataTypeMismatch` error.
    pub fn try_get_f32(&self) -> Result<&[f32], TensorGradError> {
        match self {
            Buffer::F32(v) => Ok(v),
            Buffer::F64(_) => Err(TensorGradError::DataTypeMismatch {
                expected: DType::F32,
                actual: DType::F64,
                operation: "Buffer::try_get_f32".to_string(),
            }),
        }
    }

    /// Returns the underlying f64 storage, or a `DataTypeMismatch` error.
    pub fn try_get_f64(&self) -> Result<&[f64], TensorGradError> {
        match self {
            Buffer::F64(v) => Ok(v),
            Buffer::F32(_) => Err(TensorGradError::DataTypeMismatch {
                expected: DType::F64,
                actual: DType::F32,
                operation: "Buffer::try_get_f64".to_string(),
            }),
        }
    }
}
