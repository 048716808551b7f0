use crate::autograd::BackwardOp;
use crate::error::TensorGradError;
use crate::tensor::utils::{calculate_strides, index_to_coord};
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use crate::types::DType;
use num_traits::Zero;
use std::ops::AddAssign;
use std::sync::{Arc, RwLock};

/// Backward rule for summation: every input element contributed with weight
/// one, so the gradient of its reduction cell flows back unchanged —
/// i.e. the output gradient is broadcast-expanded to the input shape.
#[derive(Debug)]
struct SumBackward {
    a_node: Arc<RwLock<TensorData>>,
    a_shape: Vec<usize>,
    /// Input shape with the reduced axes collapsed to 1 (the `keep_dims`
    /// view of the output), which the gradient is reshaped to before
    /// expansion.
    keep_shape: Vec<usize>,
}

impl BackwardOp for SumBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, TensorGradError> {
        let grad = grad_output.reshape_internal(self.keep_shape.clone())?;
        Ok(vec![grad.expand_to_shape(&self.a_shape)?])
    }

    fn inputs(&self) -> Vec<Arc<RwLock<TensorData>>> {
        vec![Arc::clone(&self.a_node)]
    }

    fn name(&self) -> &'static str {
        "sum"
    }
}

/// Fixed-order (row-major) summation kernel; deterministic by construction.
fn sum_kernel<T>(
    data: &[T],
    shape: &[usize],
    strides: &[usize],
    offset: usize,
    reduce_mask: &[bool],
    keep_shape: &[usize],
) -> Vec<T>
where
    T: Copy + Zero + AddAssign,
{
    let out_numel: usize = keep_shape.iter().product();
    let keep_strides = calculate_strides(keep_shape);
    let numel: usize = shape.iter().product();
    let logical_strides = calculate_strides(shape);

    let mut out = vec![T::zero(); out_numel];
    for i in 0..numel {
        let coords = index_to_coord(i, &logical_strides, shape);
        let mut in_offset = offset;
        let mut out_index = 0;
        for (d, &c) in coords.iter().enumerate() {
            in_offset += c * strides[d];
            if !reduce_mask[d] {
                out_index += c * keep_strides[d];
            }
        }
        out[out_index] += data[in_offset];
    }
    out
}

/// Sums a tensor over the given axes (all axes when `None`).
///
/// With `keep_dims` the reduced axes stay as size-1 dimensions; otherwise
/// they are removed, and a full reduction yields a 0-dimensional scalar.
///
/// # Errors
/// Returns `UnsupportedOperation` for an out-of-range or duplicate axis.
pub fn sum_op(
    a: &Tensor,
    axes: Option<&[usize]>,
    keep_dims: bool,
) -> Result<Tensor, TensorGradError> {
    let a_shape = a.shape();
    let rank = a_shape.len();

    let mut reduce_mask = vec![false; rank];
    match axes {
        None => reduce_mask.iter_mut().for_each(|m| *m = true),
        Some(axes) => {
            for &axis in axes {
                if axis >= rank {
                    return Err(TensorGradError::UnsupportedOperation(format!(
                        "sum axis {} out of range for rank {}",
                        axis, rank
                    )));
                }
                if reduce_mask[axis] {
                    return Err(TensorGradError::UnsupportedOperation(format!(
                        "duplicate sum axis {}",
                        axis
                    )));
                }
                reduce_mask[axis] = true;
            }
        }
    }

    let keep_shape: Vec<usize> = a_shape
        .iter()
        .enumerate()
        .map(|(d, &s)| if reduce_mask[d] { 1 } else { s })
        .collect();
    let out_shape: Vec<usize> = if keep_dims {
        keep_shape.clone()
    } else {
        a_shape
            .iter()
            .enumerate()
            .filter(|(d, _)| !reduce_mask[*d])
            .map(|(_, &s)| s)
            .collect()
    };

    let guard = a.read_data();
    let requires_grad = guard.requires_grad;
    let output = match guard.dtype {
        DType::F32 => {
            let buf = guard.buffer().try_get_f32()?;
            let data = sum_kernel(
                buf,
                &guard.shape,
                &guard.strides,
                guard.offset,
                &reduce_mask,
                &keep_shape,
            );
            Tensor::new(data, out_shape)?
        }
        DType::F64 => {
            let buf = guard.buffer().try_get_f64()?;
            let data = sum_kernel(
                buf,
                &guard.shape,
                &guard.strides,
                guard.offset,
                &reduce_mask,
                &keep_shape,
            );
            Tensor::new_f64(data, out_shape)?
        }
    };
    drop(guard);

    if requires_grad {
        output.set_grad_fn(Arc::new(SumBackward {
            a_node: Arc::clone(&a.data),
            a_shape,
            keep_shape,
        }));
    }
    Ok(output)
}

impl Tensor {
    /// Sums all elements into a 0-dimensional scalar tensor (the usual
    /// backward root).
    pub fn sum(&self) -> Result<Tensor, TensorGradError> {
        sum_op(self, None, false)
    }

    /// Sums over the given axes.
    pub fn sum_axes(&self, axes: &[usize], keep_dims: bool) -> Result<Tensor, TensorGradError> {
        sum_op(self, Some(axes), keep_dims)
    }
}
