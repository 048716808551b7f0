use crate::error::TensorGradError;

/// Strides for a contiguous (row-major) tensor of the given shape.
pub fn calculate_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; shape.len()];
    if shape.is_empty() {
        return strides;
    }
    strides[shape.len() - 1] = 1;
    for i in (0..shape.len() - 1).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Converts a flat element index into multi-dimensional coordinates for a
/// contiguous tensor of the given shape.
pub fn index_to_coord(index: usize, strides: &[usize], shape: &[usize]) -> Vec<usize> {
    let mut coords = vec![0; shape.len()];
    let mut remainder = index;
    for (i, &stride) in strides.iter().enumerate() {
        if shape[i] == 0 {
            continue;
        }
        if stride > 0 {
            coords[i] = remainder / stride;
            remainder %= stride;
        }
    }
    coords
}

/// Whether two shapes are compatible under the NumPy broadcasting rule.
pub fn broadcastable(shape_a: &[usize], shape_b: &[usize]) -> bool {
    broadcast_shapes(shape_a, shape_b).is_ok()
}

/// Result shape of broadcasting `shape_a` against `shape_b`.
///
/// Right-aligned rule: the shorter shape is padded with leading 1s; aligned
/// dimensions must be equal or contain a 1, and the result takes the max.
/// A scalar shape (empty, or all dimensions of size 1) broadcasts with
/// anything.
///
/// # Errors
/// Returns `TensorGradError::BroadcastError` if any aligned pair is neither
/// equal nor contains a 1.
pub fn broadcast_shapes(
    shape_a: &[usize],
    shape_b: &[usize],
) -> Result<Vec<usize>, TensorGradError> {
    let rank = shape_a.len().max(shape_b.len());
    let mut result = vec![0; rank];
    for i in 0..rank {
        // Right-aligned: walk both shapes from the trailing dimension.
        let dim_a = if i < shape_a.len() {
            shape_a[shape_a.len() - 1 - i]
        } else {
            1
        };
        let dim_b = if i < shape_b.len() {
            shape_b[shape_b.len() - 1 - i]
        } else {
            1
        };
        let out = if dim_a == dim_b {
            dim_a
        } else if dim_a == 1 {
            dim_b
        } else if dim_b == 1 {
            dim_a
        } else {
            return Err(TensorGradError::BroadcastError {
                shape1: shape_a.to_vec(),
                shape2: shape_b.to_vec(),
            });
        };
        result[rank - 1 - i] = out;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_strides() {
        assert_eq!(calculate_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(calculate_strides(&[5]), vec![1]);
        assert_eq!(calculate_strides(&[]), Vec::<usize>::new());
    }

    #[test]
    fn test_index_to_coord_roundtrip() {
        let shape = vec![2, 3];
        let strides = calculate_strides(&shape);
        assert_eq!(index_to_coord(0, &strides, &shape), vec![0, 0]);
        assert_eq!(index_to_coord(4, &strides, &shape), vec![1, 1]);
        assert_eq!(index_to_coord(5, &strides, &shape), vec![1, 2]);
    }

    #[test]
    fn test_broadcast_shapes_compatible() {
        assert_eq!(broadcast_shapes(&[2, 2], &[2, 2]).unwrap(), vec![2, 2]);
        assert_eq!(broadcast_shapes(&[2, 2], &[1]).unwrap(), vec![2, 2]);
        assert_eq!(broadcast_shapes(&[1], &[2, 2]).unwrap(), vec![2, 2]);
        assert_eq!(
            broadcast_shapes(&[4, 1, 3], &[2, 3]).unwrap(),
            vec![4, 2, 3]
        );
        // Scalar shapes broadcast with anything.
        assert_eq!(broadcast_shapes(&[], &[3, 2]).unwrap(), vec![3, 2]);
        assert_eq!(broadcast_shapes(&[1, 1], &[5]).unwrap(), vec![1, 5]);
    }

    #[test]
    fn test_broadcast_shapes_incompatible() {
        let err = broadcast_shapes(&[2, 2], &[2, 3]).unwrap_err();
        assert_eq!(
            err,
            TensorGradError::BroadcastError {
                shape1: vec![2, 2],
                shape2: vec![2, 3],
            }
        );
        assert!(broadcastable(&[2, 2], &[1]));
        assert!(!broadcastable(&[3], &[4]));
    }
}
