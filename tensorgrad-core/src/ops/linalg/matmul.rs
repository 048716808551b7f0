use crate::autograd::BackwardOp;
use crate::error::TensorGradError;
use crate::tensor::utils::{broadcast_shapes, calculate_strides, index_to_coord};
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use crate::types::DType;
use num_traits::Zero;
use std::ops::{AddAssign, Mul};
use std::sync::{Arc, RwLock};

/// Backward rule for matrix multiplication `C = A · B`:
/// `grad -> A: grad · Bᵗ`, `grad -> B: Aᵗ · grad`, each reduced back over
/// broadcast batch dimensions.
#[derive(Debug)]
struct MatmulBackward {
    a_node: Arc<RwLock<TensorData>>,
    b_node: Arc<RwLock<TensorData>>,
    a_shape: Vec<usize>,
    b_shape: Vec<usize>,
}

impl BackwardOp for MatmulBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, TensorGradError> {
        let a = Tensor {
            data: Arc::clone(&self.a_node),
        }
        .detach();
        let b = Tensor {
            data: Arc::clone(&self.b_node),
        }
        .detach();

        let grad_a = matmul_op(grad_output, &transpose_last_two(&b)?)?
            .reduce_to_shape(&self.a_shape)?;
        let grad_b = matmul_op(&transpose_last_two(&a)?, grad_output)?
            .reduce_to_shape(&self.b_shape)?;
        Ok(vec![grad_a, grad_b])
    }

    fn inputs(&self) -> Vec<Arc<RwLock<TensorData>>> {
        vec![Arc::clone(&self.a_node), Arc::clone(&self.b_node)]
    }

    fn name(&self) -> &'static str {
        "matmul"
    }
}

/// Swaps the last two dimensions, materializing the result. Internal
/// non-differentiable helper for the matmul backward rule.
pub(crate) fn transpose_last_two(t: &Tensor) -> Result<Tensor, TensorGradError> {
    let guard = t.read_data();
    let rank = guard.shape.len();
    if rank < 2 {
        return Err(TensorGradError::UnsupportedOperation(format!(
            "transpose_last_two requires rank >= 2, got shape {:?}",
            guard.shape
        )));
    }
    let mut out_shape = guard.shape.clone();
    out_shape.swap(rank - 1, rank - 2);
    let out_strides = calculate_strides(&out_shape);
    let numel = guard.numel();

    fn kernel<T: Copy>(
        data: &[T],
        strides: &[usize],
        offset: usize,
        out_shape: &[usize],
        out_strides: &[usize],
        numel: usize,
    ) -> Vec<T> {
        let rank = out_shape.len();
        let mut out = Vec::with_capacity(numel);
        for i in 0..numel {
            let mut coords = index_to_coord(i, out_strides, out_shape);
            coords.swap(rank - 1, rank - 2);
            let src = offset + coords.iter().zip(strides).map(|(&c, &s)| c * s).sum::<usize>();
            out.push(data[src]);
        }
        out
    }

    match guard.dtype {
        DType::F32 => {
            let buf = guard.buffer().try_get_f32()?;
            let data = kernel(buf, &guard.strides, guard.offset, &out_shape, &out_strides, numel);
            Tensor::new(data, out_shape)
        }
        DType::F64 => {
            let buf = guard.buffer().try_get_f64()?;
            let data = kernel(buf, &guard.strides, guard.offset, &out_shape, &out_strides, numel);
            Tensor::new_f64(data, out_shape)
        }
    }
}

/// Naive triple-loop kernel over one broadcast batch of matrices.
/// Accumulation order is fixed, so results are reproducible.
#[allow(clippy::too_many_arguments)]
fn matmul_kernel<T>(
    a_data: &[T],
    a_shape: &[usize],
    a_strides: &[usize],
    a_offset: usize,
    b_data: &[T],
    b_shape: &[usize],
    b_strides: &[usize],
    b_offset: usize,
    batch_shape: &[usize],
    m: usize,
    k: usize,
    n: usize,
) -> Vec<T>
where
    T: Copy + Zero + AddAssign + Mul<Output = T>,
{
    let batch_numel: usize = batch_shape.iter().product::<usize>().max(1);
    let batch_strides = calculate_strides(batch_shape);
    let a_batch_rank = a_shape.len() - 2;
    let b_batch_rank = b_shape.len() - 2;
    let batch_rank = batch_shape.len();

    let mut out = Vec::with_capacity(batch_numel * m * n);
    for batch in 0..batch_numel {
        let coords = index_to_coord(batch, &batch_strides, batch_shape);

        let mut a_base = a_offset;
        for d in 0..a_batch_rank {
            let c = if a_shape[d] == 1 {
                0
            } else {
                coords[batch_rank - a_batch_rank + d]
            };
            a_base += c * a_strides[d];
        }
        let mut b_base = b_offset;
        for d in 0..b_batch_rank {
            let c = if b_shape[d] == 1 {
                0
            } else {
                coords[batch_rank - b_batch_rank + d]
            };
            b_base += c * b_strides[d];
        }

        let (a_row, a_col) = (a_strides[a_shape.len() - 2], a_strides[a_shape.len() - 1]);
        let (b_row, b_col) = (b_strides[b_shape.len() - 2], b_strides[b_shape.len() - 1]);
        for i in 0..m {
            for j in 0..n {
                let mut acc = T::zero();
                for l in 0..k {
                    acc += a_data[a_base + i * a_row + l * a_col]
                        * b_data[b_base + l * b_row + j * b_col];
                }
                out.push(acc);
            }
        }
    }
    out
}

/// Matrix multiplication `C = A · B` with broadcast batch dimensions.
///
/// `A: [..., m, k]`, `B: [..., k, n]` -> `C: [batch..., m, n]`, where the
/// leading dimensions broadcast against each other under the usual rule.
///
/// # Errors
/// `IncompatibleShapes` if either operand has rank < 2 or the inner
/// dimensions disagree; `BroadcastError` if the batch dimensions do.
pub fn matmul_op(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorGradError> {
    let a_shape = a.shape();
    let b_shape = b.shape();
    if a_shape.len() < 2 || b_shape.len() < 2 {
        return Err(TensorGradError::IncompatibleShapes {
            shape1: a_shape,
            shape2: b_shape,
            operation: "matmul".to_string(),
        });
    }
    let m = a_shape[a_shape.len() - 2];
    let k = a_shape[a_shape.len() - 1];
    let n = b_shape[b_shape.len() - 1];
    if b_shape[b_shape.len() - 2] != k {
        return Err(TensorGradError::IncompatibleShapes {
            shape1: a_shape,
            shape2: b_shape,
            operation: "matmul".to_string(),
        });
    }
    let batch_shape = broadcast_shapes(
        &a_shape[..a_shape.len() - 2],
        &b_shape[..b_shape.len() - 2],
    )?;
    let mut out_shape = batch_shape.clone();
    out_shape.push(m);
    out_shape.push(n);

    let a_guard = a.read_data();
    let b_guard = b.read_data();
    if a_guard.dtype != b_guard.dtype {
        return Err(TensorGradError::DataTypeMismatch {
            expected: a_guard.dtype,
            actual: b_guard.dtype,
            operation: "matmul".to_string(),
        });
    }

    let output = match a_guard.dtype {
        DType::F32 => {
            let a_buf = a_guard.buffer().try_get_f32()?;
            let b_buf = b_guard.buffer().try_get_f32()?;
            let data = matmul_kernel(
                a_buf,
                &a_guard.shape,
                &a_guard.strides,
                a_guard.offset,
                b_buf,
                &b_guard.shape,
                &b_guard.strides,
                b_guard.offset,
                &batch_shape,
                m,
                k,
                n,
            );
            Tensor::new(data, out_shape)?
        }
        DType::F64 => {
            let a_buf = a_guard.buffer().try_get_f64()?;
            let b_buf = b_guard.buffer().try_get_f64()?;
            let data = matmul_kernel(
                a_buf,
                &a_guard.shape,
                &a_guard.strides,
                a_guard.offset,
                b_buf,
                &b_guard.shape,
                &b_guard.strides,
                b_guard.offset,
                &batch_shape,
                m,
                k,
                n,
            );
            Tensor::new_f64(data, out_shape)?
        }
    };

    let requires_grad = a_guard.requires_grad || b_guard.requires_grad;
    drop(a_guard);
    drop(b_guard);

    if requires_grad {
        output.set_grad_fn(Arc::new(MatmulBackward {
            a_node: Arc::clone(&a.data),
            b_node: Arc::clone(&b.data),
            a_shape: a.shape(),
            b_shape: b.shape(),
        }));
    }
    Ok(output)
}

impl Tensor {
    /// See [`matmul_op`].
    pub fn matmul(&self, other: &Tensor) -> Result<Tensor, TensorGradError> {
        matmul_op(self, other)
    }
}
