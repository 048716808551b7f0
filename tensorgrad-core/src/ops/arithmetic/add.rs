use crate::autograd::BackwardOp;
use crate::error::TensorGradError;
use crate::ops::{apply_binary_op, scalar_tensor};
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use std::sync::{Arc, RwLock};

/// Backward rule for addition: the gradient flows through unchanged, reduced
/// back over any broadcast dimensions.
#[derive(Debug)]
struct AddBackward {
    a_node: Arc<RwLock<TensorData>>,
    b_node: Arc<RwLock<TensorData>>,
    a_shape: Vec<usize>,
    b_shape: Vec<usize>,
}

impl BackwardOp for AddBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, TensorGradError> {
        let grad_a = grad_output.reduce_to_shape(&self.a_shape)?;
        let grad_b = grad_output.reduce_to_shape(&self.b_shape)?;
        Ok(vec![grad_a, grad_b])
    }

    fn inputs(&self) -> Vec<Arc<RwLock<TensorData>>> {
        vec![Arc::clone(&self.a_node), Arc::clone(&self.b_node)]
    }

    fn name(&self) -> &'static str {
        "add"
    }
}

/// Element-wise addition with broadcasting: `a + b`.
pub fn add_op(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorGradError> {
    let a_shape = a.shape();
    let b_shape = b.shape();
    apply_binary_op(
        a,
        b,
        |x, y| x + y,
        |x, y| x + y,
        move |a_node, b_node| {
            Arc::new(AddBackward {
                a_node,
                b_node,
                a_shape,
                b_shape,
            })
        },
        "add",
    )
}

/// Adds a raw scalar, auto-wrapped as a constant leaf of `a`'s dtype.
pub fn add_op_scalar(a: &Tensor, scalar: f64) -> Result<Tensor, TensorGradError> {
    let s = scalar_tensor(scalar, a.dtype())?;
    add_op(a, &s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{check_grad, GradCheckError};
    use crate::tensor::create::randn_f64;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_add_forward() {
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]).unwrap();
        let b = Tensor::new(vec![10.0, 20.0, 30.0, 40.0], vec![2, 2]).unwrap();
        let c = add_op(&a, &b).unwrap();
        assert_eq!(c.get_f32_data().unwrap(), vec![11.0, 22.0, 33.0, 44.0]);
        assert!(!c.requires_grad());
    }

    #[test]
    fn test_add_broadcast_forward() {
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]).unwrap();
        let b = Tensor::new(vec![10.0], vec![1]).unwrap();
        let c = add_op(&a, &b).unwrap();
        assert_eq!(c.shape(), vec![2, 2]);
        assert_eq!(c.get_f32_data().unwrap(), vec![11.0, 12.0, 13.0, 14.0]);
    }

    #[test]
    fn test_add_incompatible_shapes() {
        let a = Tensor::new(vec![1.0; 4], vec![2, 2]).unwrap();
        let b = Tensor::new(vec![1.0; 6], vec![2, 3]).unwrap();
        let err = add_op(&a, &b).unwrap_err();
        assert_eq!(
            err,
            TensorGradError::BroadcastError {
                shape1: vec![2, 2],
                shape2: vec![2, 3],
            }
        );
    }

    #[test]
    fn test_add_propagates_requires_grad() {
        let a = Tensor::new(vec![1.0], vec![1]).unwrap();
        let b = Tensor::new(vec![2.0], vec![1]).unwrap();
        b.requires_grad_(true).unwrap();
        let c = add_op(&a, &b).unwrap();
        assert!(c.requires_grad());
        assert!(c.grad_fn().is_some());

        let d = add_op(&a, &a).unwrap();
        assert!(!d.requires_grad());
        assert!(d.grad_fn().is_none());
    }

    #[test]
    fn test_broadcast_gradient_shape_law() {
        // a: (2,2), b: (1,). Backward of sum(a+b) must reduce b's gradient
        // over the 4 broadcast contributions.
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]).unwrap();
        a.requires_grad_(true).unwrap();
        let b = Tensor::new(vec![10.0], vec![1]).unwrap();
        b.requires_grad_(true).unwrap();

        let c = add_op(&a, &b).unwrap();
        let loss = c.sum().unwrap();
        loss.backward().unwrap();

        let grad_a = a.grad().unwrap();
        assert_eq!(grad_a.shape(), vec![2, 2]);
        assert_eq!(grad_a.get_f32_data().unwrap(), vec![1.0; 4]);

        let grad_b = b.grad().unwrap();
        assert_eq!(grad_b.shape(), vec![1]);
        assert_eq!(grad_b.get_f32_data().unwrap(), vec![4.0]);
    }

    #[test]
    fn test_add_finite_difference() -> Result<(), GradCheckError> {
        let mut rng = StdRng::seed_from_u64(3);
        let a = randn_f64(&[2, 2], &mut rng).unwrap();
        a.requires_grad_(true).unwrap();
        let b = randn_f64(&[2], &mut rng).unwrap();
        b.requires_grad_(true).unwrap();
        check_grad(
            |inputs| add_op(&inputs[0], &inputs[1])?.sum(),
            &[a, b],
            1e-5,
            1e-6,
        )
    }

    #[test]
    fn test_add_scalar_auto_wrap() {
        let a = Tensor::new(vec![1.0, 2.0], vec![2]).unwrap();
        a.requires_grad_(true).unwrap();
        let c = add_op_scalar(&a, 0.5).unwrap();
        assert_eq!(c.get_f32_data().unwrap(), vec![1.5, 2.5]);

        let loss = c.sum().unwrap();
        loss.backward().unwrap();
        assert_eq!(a.grad().unwrap().get_f32_data().unwrap(), vec![1.0, 1.0]);
    }
}
