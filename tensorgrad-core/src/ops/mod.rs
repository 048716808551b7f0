//! Tensor operations.
//!
//! Each operation lives in its own file as an `xxx_op` function that
//! performs the forward computation eagerly, and a `XxxBackward` struct
//! implementing [`BackwardOp`](crate::autograd::BackwardOp) that carries the
//! captured inputs and the derivative formula for the deferred backward
//! pass. The helpers below centralize dtype dispatch, broadcasting, and
//! autograd wiring so the per-op files only state their formulas.

pub mod activation;
pub mod arithmetic;
pub mod linalg;
pub mod reduction;

use crate::autograd::BackwardOp;
use crate::error::TensorGradError;
use crate::tensor::utils::{broadcast_shapes, calculate_strides, index_to_coord};
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use crate::types::DType;
use std::sync::{Arc, RwLock};

/// Element-wise kernel over two broadcast operands.
///
/// Iterates the output in row-major order and maps every output coordinate
/// back to an input element, pinning size-1 input dimensions to index 0.
/// The loop order is fixed, so results are bit-for-bit reproducible.
pub(crate) fn broadcast_zip_kernel<T, F>(
    a_data: &[T],
    a_shape: &[usize],
    a_strides: &[usize],
    a_offset: usize,
    b_data: &[T],
    b_shape: &[usize],
    b_strides: &[usize],
    b_offset: usize,
    out_shape: &[usize],
    f: F,
) -> Vec<T>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    let numel: usize = out_shape.iter().product();
    let out_strides = calculate_strides(out_shape);
    let rank_diff_a = out_shape.len() - a_shape.len();
    let rank_diff_b = out_shape.len() - b_shape.len();

    let mut out = Vec::with_capacity(numel);
    for i in 0..numel {
        let out_coords = index_to_coord(i, &out_strides, out_shape);

        let mut offset_a = a_offset;
        for (dim, (&size, &stride)) in a_shape.iter().zip(a_strides).enumerate() {
            let coord = if size == 1 {
                0
            } else {
                out_coords[rank_diff_a + dim]
            };
            offset_a += coord * stride;
        }

        let mut offset_b = b_offset;
        for (dim, (&size, &stride)) in b_shape.iter().zip(b_strides).enumerate() {
            let coord = if size == 1 {
                0
            } else {
                out_coords[rank_diff_b + dim]
            };
            offset_b += coord * stride;
        }

        out.push(f(a_data[offset_a], b_data[offset_b]));
    }
    out
}

/// Applies a unary element-wise operation.
///
/// Handles dtype dispatch, output creation, and autograd wiring. The
/// backward builder receives a strong reference to the input node; it is
/// only invoked when the input requires grad.
pub(crate) fn apply_unary_op<F32Op, F64Op, B>(
    a: &Tensor,
    op_f32: F32Op,
    op_f64: F64Op,
    backward_builder: B,
    _op_name: &str,
) -> Result<Tensor, TensorGradError>
where
    F32Op: Fn(f32) -> f32,
    F64Op: Fn(f64) -> f64,
    B: FnOnce(Arc<RwLock<TensorData>>) -> Arc<dyn BackwardOp + Send + Sync>,
{
    let guard = a.read_data();
    let shape = guard.shape.clone();
    let offset = guard.offset;
    let numel = guard.numel();
    let requires_grad = guard.requires_grad;

    let output = match guard.dtype {
        DType::F32 => {
            let buf = guard.buffer().try_get_f32()?;
            let data: Vec<f32> = buf[offset..offset + numel].iter().map(|&x| op_f32(x)).collect();
            drop(guard);
            Tensor::new(data, shape)?
        }
        DType::F64 => {
            let buf = guard.buffer().try_get_f64()?;
            let data: Vec<f64> = buf[offset..offset + numel].iter().map(|&x| op_f64(x)).collect();
            drop(guard);
            Tensor::new_f64(data, shape)?
        }
    };

    if requires_grad {
        output.set_grad_fn(backward_builder(Arc::clone(&a.data)));
    }
    Ok(output)
}

/// Applies a binary element-wise operation with NumPy-style broadcasting.
///
/// Validates broadcastability and dtype equality, runs the kernel for the
/// common dtype, and wires the backward rule when either input requires
/// grad. The backward builder receives strong references to both input
/// nodes, in operand order.
pub(crate) fn apply_binary_op<F32Op, F64Op, B>(
    a: &Tensor,
    b: &Tensor,
    op_f32: F32Op,
    op_f64: F64Op,
    backward_builder: B,
    op_name: &str,
) -> Result<Tensor, TensorGradError>
where
    F32Op: Fn(f32, f32) -> f32,
    F64Op: Fn(f64, f64) -> f64,
    B: FnOnce(Arc<RwLock<TensorData>>, Arc<RwLock<TensorData>>) -> Arc<dyn BackwardOp + Send + Sync>,
{
    let a_guard = a.read_data();
    let b_guard = b.read_data();

    if a_guard.dtype != b_guard.dtype {
        return Err(TensorGradError::DataTypeMismatch {
            expected: a_guard.dtype,
            actual: b_guard.dtype,
            operation: op_name.to_string(),
        });
    }
    let out_shape = broadcast_shapes(&a_guard.shape, &b_guard.shape)?;

    let output = match a_guard.dtype {
        DType::F32 => {
            let a_buf = a_guard.buffer().try_get_f32()?;
            let b_buf = b_guard.buffer().try_get_f32()?;
            let data = broadcast_zip_kernel(
                a_buf,
                &a_guard.shape,
                &a_guard.strides,
                a_guard.offset,
                b_buf,
                &b_guard.shape,
                &b_guard.strides,
                b_guard.offset,
                &out_shape,
                op_f32,
            );
            Tensor::new(data, out_shape)?
        }
        DType::F64 => {
            let a_buf = a_guard.buffer().try_get_f64()?;
            let b_buf = b_guard.buffer().try_get_f64()?;
            let data = broadcast_zip_kernel(
                a_buf,
                &a_guard.shape,
                &a_guard.strides,
                a_guard.offset,
                b_buf,
                &b_guard.shape,
                &b_guard.strides,
                b_guard.offset,
                &out_shape,
                op_f64,
            );
            Tensor::new_f64(data, out_shape)?
        }
    };

    let requires_grad = a_guard.requires_grad || b_guard.requires_grad;
    drop(a_guard);
    drop(b_guard);

    if requires_grad {
        output.set_grad_fn(backward_builder(Arc::clone(&a.data), Arc::clone(&b.data)));
    }
    Ok(output)
}

/// Wraps a raw scalar as a constant (non-grad) leaf of the given dtype, for
/// the `op(tensor, scalar)` convenience entry points.
pub(crate) fn scalar_tensor(value: f64, dtype: DType) -> Result<Tensor, TensorGradError> {
    match dtype {
        DType::F32 => Tensor::new(vec![value as f32], vec![]),
        DType::F64 => Tensor::new_f64(vec![value], vec![]),
    }
}
