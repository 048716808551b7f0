//! Gradient/shape reconciliation for broadcasting.
//!
//! When a forward operation broadcast an operand up to a larger output
//! shape, the backward step must sum the incoming gradient over every
//! padded or broadcast (1 -> k) dimension to restore the operand's shape.
//! Omitting this silently produces gradients of the wrong shape or
//! magnitude whenever broadcasting participated in the forward pass — every
//! backward rule funnels through [`Tensor::reduce_to_shape`].

use crate::error::TensorGradError;
use crate::ops::reduction::sum_op;
use crate::tensor::utils::{calculate_strides, index_to_coord};
use crate::tensor::Tensor;
use crate::types::DType;

impl Tensor {
    /// Reduces this (gradient) tensor to `target_shape` by summing along
    /// dimensions that were introduced or expanded by broadcasting.
    pub fn reduce_to_shape(&self, target_shape: &[usize]) -> Result<Tensor, TensorGradError> {
        let current_shape = self.shape();
        if current_shape == target_shape {
            return Ok(self.clone());
        }

        let current_rank = current_shape.len();
        let target_rank = target_shape.len();
        if current_rank < target_rank {
            return Err(TensorGradError::InternalError(format!(
                "cannot reduce shape {:?} to larger-rank target {:?}",
                current_shape, target_shape
            )));
        }

        // Leading padded dimensions always get summed away; aligned
        // dimensions only when the target held a 1 that was expanded.
        let rank_diff = current_rank - target_rank;
        let mut axes: Vec<usize> = (0..rank_diff).collect();
        for i in 0..target_rank {
            let current_dim = current_shape[rank_diff + i];
            let target_dim = target_shape[i];
            if current_dim != target_dim {
                if target_dim == 1 {
                    axes.push(rank_diff + i);
                } else {
                    return Err(TensorGradError::InternalError(format!(
                        "cannot reduce shape {:?} to {:?}: dimension {} is {} vs {}",
                        current_shape, target_shape, i, current_dim, target_dim
                    )));
                }
            }
        }

        if axes.is_empty() {
            // Same numel, rank differs only through size-1 dims.
            return self.reshape_internal(target_shape.to_vec());
        }

        let reduced = sum_op(self, Some(&axes), true)?;
        if reduced.shape() == target_shape {
            Ok(reduced)
        } else {
            reduced.reshape_internal(target_shape.to_vec())
        }
    }

    /// Materializes the broadcast of this tensor up to `target_shape`
    /// (each of its dimensions must be 1 or equal to the aligned target
    /// dimension). Counterpart of [`Tensor::reduce_to_shape`], used by the
    /// sum backward.
    pub fn expand_to_shape(&self, target_shape: &[usize]) -> Result<Tensor, TensorGradError> {
        let guard = self.read_data();
        if guard.shape == target_shape {
            drop(guard);
            return Ok(self.clone());
        }

        let rank_diff = target_shape
            .len()
            .checked_sub(guard.shape.len())
            .ok_or_else(|| TensorGradError::BroadcastError {
                shape1: guard.shape.clone(),
                shape2: target_shape.to_vec(),
            })?;
        for (d, &size) in guard.shape.iter().enumerate() {
            let target = target_shape[rank_diff + d];
            if size != 1 && size != target {
                return Err(TensorGradError::BroadcastError {
                    shape1: guard.shape.clone(),
                    shape2: target_shape.to_vec(),
                });
            }
        }

        let target_numel: usize = target_shape.iter().product();
        let target_strides = calculate_strides(target_shape);

        fn expand<T: Copy>(
            data: &[T],
            shape: &[usize],
            strides: &[usize],
            offset: usize,
            rank_diff: usize,
            target_shape: &[usize],
            target_strides: &[usize],
            target_numel: usize,
        ) -> Vec<T> {
            let mut out = Vec::with_capacity(target_numel);
            for i in 0..target_numel {
                let coords = index_to_coord(i, target_strides, target_shape);
                let mut src = offset;
                for (d, (&size, &stride)) in shape.iter().zip(strides).enumerate() {
                    let c = if size == 1 { 0 } else { coords[rank_diff + d] };
                    src += c * stride;
                }
                out.push(data[src]);
            }
            out
        }

        match guard.dtype {
            DType::F32 => {
                let buf = guard.buffer().try_get_f32()?;
                let data = expand(
                    buf,
                    &guard.shape,
                    &guard.strides,
                    guard.offset,
                    rank_diff,
                    target_shape,
                    &target_strides,
                    target_numel,
                );
                Tensor::new(data, target_shape.to_vec())
            }
            DType::F64 => {
                let buf = guard.buffer().try_get_f64()?;
                let data = expand(
                    buf,
                    &guard.shape,
                    &guard.strides,
                    guard.offset,
                    rank_diff,
                    target_shape,
                    &target_strides,
                    target_numel,
                );
                Tensor::new_f64(data, target_shape.to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_to_same_shape_is_identity() {
        let t = Tensor::new(vec![1.0, 2.0], vec![2]).unwrap();
        let r = t.reduce_to_shape(&[2]).unwrap();
        assert_eq!(r.get_f32_data().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_reduce_padded_dimensions() {
        // Gradient of shape (2,3) reduced to a (3,) operand: sum rows.
        let g = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]).unwrap();
        let r = g.reduce_to_shape(&[3]).unwrap();
        assert_eq!(r.shape(), vec![3]);
        assert_eq!(r.get_f32_data().unwrap(), vec![5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_reduce_expanded_size_one_dimension() {
        // Gradient of shape (2,3) reduced to a (2,1) operand: sum columns.
        let g = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]).unwrap();
        let r = g.reduce_to_shape(&[2, 1]).unwrap();
        assert_eq!(r.shape(), vec![2, 1]);
        assert_eq!(r.get_f32_data().unwrap(), vec![6.0, 15.0]);
    }

    #[test]
    fn test_reduce_to_scalar_shape() {
        let g = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]).unwrap();
        let r = g.reduce_to_shape(&[]).unwrap();
        assert_eq!(r.shape(), Vec::<usize>::new());
        assert_eq!(r.item_f64().unwrap(), 10.0);
    }

    #[test]
    fn test_reduce_incompatible_is_error() {
        let g = Tensor::new(vec![1.0; 6], vec![2, 3]).unwrap();
        assert!(g.reduce_to_shape(&[2, 2]).is_err());
    }

    #[test]
    fn test_expand_to_shape() {
        let t = Tensor::new(vec![1.0, 2.0], vec![1, 2]).unwrap();
        let e = t.expand_to_shape(&[3, 2]).unwrap();
        assert_eq!(e.shape(), vec![3, 2]);
        assert_eq!(
            e.get_f32_data().unwrap(),
            vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0]
        );

        let s = Tensor::new_f64(vec![5.0], vec![]).unwrap();
        let e = s.expand_to_shape(&[2, 2]).unwrap();
        assert_eq!(e.get_f64_data().unwrap(), vec![5.0; 4]);
    }

    #[test]
    fn test_expand_incompatible_is_error() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0], vec![3]).unwrap();
        assert!(t.expand_to_shape(&[2, 2]).is_err());
    }
}
