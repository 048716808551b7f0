use crate::buffer::Buffer;
use crate::error::TensorGradError;
use crate::tensor_data::TensorData;
use crate::types::DType;
use std::fmt;
use std::sync::{Arc, RwLock};

mod autograd;
pub mod broadcast;
pub mod create;
pub mod utils;

pub use create::{full, full_f64, ones, ones_like, randn, randn_f64, zeros, zeros_like};

/// A multi-dimensional array and, at the same time, one vertex of the
/// implicit computation graph.
///
/// `Tensor` wraps `Arc<RwLock<TensorData>>`:
/// 1. **Shared ownership** — every operation output holds strong references
///    to its inputs through its backward rule, and user code holds handles
///    to whichever nodes it cares about. A node is freed when the last
///    handle (graph edge or user handle) is dropped; the graph is a DAG by
///    construction, so reference counting cannot leak.
/// 2. **Interior mutability** — `grad` (during backward) and the data of
///    parameter leaves (during optimizer steps) mutate behind immutable
///    handles; topology never does.
pub struct Tensor {
    pub(crate) data: Arc<RwLock<TensorData>>,
}

impl Tensor {
    /// Creates a new f32 CPU tensor with contiguous strides.
    ///
    /// This is the `leaf` construction entry point; combine with
    /// [`Tensor::requires_grad_`] to obtain a trainable parameter leaf.
    pub fn new(data_vec: Vec<f32>, shape: Vec<usize>) -> Result<Self, TensorGradError> {
        let tensor_data = TensorData::new(data_vec, shape)?;
        Ok(Tensor {
            data: Arc::new(RwLock::new(tensor_data)),
        })
    }

    /// Creates a new f64 CPU tensor with contiguous strides.
    pub fn new_f64(data_vec: Vec<f64>, shape: Vec<usize>) -> Result<Self, TensorGradError> {
        let tensor_data = TensorData::new_f64(data_vec, shape)?;
        Ok(Tensor {
            data: Arc::new(RwLock::new(tensor_data)),
        })
    }

    pub(crate) fn from_data(tensor_data: TensorData) -> Self {
        Tensor {
            data: Arc::new(RwLock::new(tensor_data)),
        }
    }

    /// Returns the data type of the tensor elements.
    pub fn dtype(&self) -> DType {
        self.read_data().dtype
    }

    /// Returns a clone of the tensor's shape.
    pub fn shape(&self) -> Vec<usize> {
        self.read_data().shape.clone()
    }

    /// Returns a clone of the tensor's strides.
    pub fn strides(&self) -> Vec<usize> {
        self.read_data().strides.clone()
    }

    /// Returns the number of elements in the tensor.
    pub fn numel(&self) -> usize {
        self.read_data().numel()
    }

    /// A tensor with one element (including the 0-dimensional case) has a
    /// scalar shape and may seed a backward pass.
    pub fn is_scalar(&self) -> bool {
        self.numel() == 1
    }

    /// Checks if the tensor is contiguous in memory.
    pub fn is_contiguous(&self) -> bool {
        self.read_data().is_contiguous()
    }

    /// Acquires a read lock on the tensor's data.
    /// Panics if the RwLock is poisoned.
    pub fn read_data(&self) -> std::sync::RwLockReadGuard<'_, TensorData> {
        self.data.read().expect("RwLock poisoned")
    }

    /// Acquires a write lock on the tensor's data.
    /// Panics if the RwLock is poisoned.
    pub fn write_data(&self) -> std::sync::RwLockWriteGuard<'_, TensorData> {
        self.data.write().expect("RwLock poisoned")
    }

    /// Copies the tensor data out as a `Vec<f32>`.
    ///
    /// # Errors
    /// Returns `DataTypeMismatch` if the tensor is not F32.
    pub fn get_f32_data(&self) -> Result<Vec<f32>, TensorGradError> {
        let guard = self.read_data();
        let buf = guard.buffer().try_get_f32()?;
        Ok(buf[guard.offset..guard.offset + guard.numel()].to_vec())
    }

    /// Copies the tensor data out as a `Vec<f64>`.
    ///
    /// # Errors
    /// Returns `DataTypeMismatch` if the tensor is not F64.
    pub fn get_f64_data(&self) -> Result<Vec<f64>, TensorGradError> {
        let guard = self.read_data();
        let buf = guard.buffer().try_get_f64()?;
        Ok(buf[guard.offset..guard.offset + guard.numel()].to_vec())
    }

    /// Copies the tensor data out as a `Vec<f64>` regardless of its dtype.
    /// Used by the optimizers and the gradient checker, which accumulate in
    /// f64.
    pub fn to_f64_vec(&self) -> Result<Vec<f64>, TensorGradError> {
        let guard = self.read_data();
        let numel = guard.numel();
        match guard.buffer() {
            Buffer::F32(v) => Ok(v[guard.offset..guard.offset + numel]
                .iter()
                .map(|&x| x as f64)
                .collect()),
            Buffer::F64(v) => Ok(v[guard.offset..guard.offset + numel].to_vec()),
        }
    }

    /// Extracts the value of a scalar-shaped tensor as f64.
    ///
    /// # Errors
    /// Returns `ShapeMismatch` if the tensor has more than one element.
    pub fn item_f64(&self) -> Result<f64, TensorGradError> {
        if self.numel() != 1 {
            return Err(TensorGradError::ShapeMismatch {
                expected: vec![1],
                actual: self.shape(),
                operation: "item_f64".to_string(),
            });
        }
        Ok(self.to_f64_vec()?[0])
    }

    /// Overwrites the tensor's data in place, converting from f64 to the
    /// tensor's own dtype. The shape is unchanged; this is how optimizers
    /// apply parameter updates between passes.
    pub(crate) fn set_data_from_f64(&self, values: Vec<f64>) -> Result<(), TensorGradError> {
        let mut guard = self.write_data();
        if values.len() != guard.numel() {
            return Err(TensorGradError::ShapeMismatch {
                expected: guard.shape.clone(),
                actual: vec![values.len()],
                operation: "set_data_from_f64".to_string(),
            });
        }
        guard.buffer = match guard.dtype {
            DType::F32 => Buffer::F32(Arc::new(values.iter().map(|&x| x as f32).collect())),
            DType::F64 => Buffer::F64(Arc::new(values)),
        };
        guard.offset = 0;
        Ok(())
    }

    /// Internal non-differentiable reshape: shares the buffer, new shape and
    /// contiguous strides, no autograd metadata. Used by the gradient
    /// plumbing (`reduce_to_shape`) only.
    pub(crate) fn reshape_internal(
        &self,
        new_shape: Vec<usize>,
    ) -> Result<Tensor, TensorGradError> {
        let guard = self.read_data();
        let new_numel: usize = new_shape.iter().product();
        if new_numel != guard.numel() {
            return Err(TensorGradError::ShapeMismatch {
                expected: guard.shape.clone(),
                actual: new_shape,
                operation: "reshape_internal".to_string(),
            });
        }
        if !guard.is_contiguous() {
            return Err(TensorGradError::UnsupportedOperation(
                "reshape_internal requires a contiguous tensor".to_string(),
            ));
        }
        let strides = utils::calculate_strides(&new_shape);
        Ok(Tensor::from_data(TensorData {
            buffer: guard.buffer.clone(),
            dtype: guard.dtype,
            shape: new_shape,
            strides,
            offset: guard.offset,
            requires_grad: false,
            grad: None,
            grad_fn: None,
        }))
    }
}

impl Clone for Tensor {
    /// Clones the handle, not the data: both tensors refer to the same node.
    fn clone(&self) -> Self {
        Tensor {
            data: Arc::clone(&self.data),
        }
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.read_data();
        f.debug_struct("Tensor")
            .field("shape", &guard.shape)
            .field("dtype", &guard.dtype)
            .field("requires_grad", &guard.requires_grad)
            .field(
                "op",
                &guard.grad_fn.as_ref().map(|g| g.name()).unwrap_or("leaf"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_length() {
        let err = Tensor::new(vec![1.0, 2.0, 3.0], vec![2, 2]).unwrap_err();
        assert_eq!(
            err,
            TensorGradError::TensorCreationError {
                data_len: 3,
                shape: vec![2, 2],
            }
        );
    }

    #[test]
    fn test_accessors() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]).unwrap();
        assert_eq!(t.shape(), vec![2, 3]);
        assert_eq!(t.strides(), vec![3, 1]);
        assert_eq!(t.numel(), 6);
        assert_eq!(t.dtype(), DType::F32);
        assert!(t.is_contiguous());
        assert!(!t.is_scalar());
        assert_eq!(t.get_f32_data().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_item_and_scalar_shapes() {
        let scalar = Tensor::new_f64(vec![2.5], vec![]).unwrap();
        assert!(scalar.is_scalar());
        assert_eq!(scalar.item_f64().unwrap(), 2.5);

        let one_by_one = Tensor::new(vec![3.0], vec![1, 1]).unwrap();
        assert!(one_by_one.is_scalar());
        assert_eq!(one_by_one.item_f64().unwrap(), 3.0);
    }

    #[test]
    fn test_clone_shares_node() {
        let t = Tensor::new(vec![1.0], vec![1]).unwrap();
        let u = t.clone();
        assert_eq!(t.node_id(), u.node_id());
    }
}
