use crate::autograd::BackwardOp;
use crate::error::TensorGradError;
use crate::ops::{apply_binary_op, scalar_tensor};
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use std::sync::{Arc, RwLock};

/// Backward rule for element-wise multiplication: each operand receives the
/// gradient scaled by the *other* operand's forward value, reduced back over
/// broadcast dimensions. The rule computes on detached views, so it never
/// extends the graph.
#[derive(Debug)]
struct MulBackward {
    a_node: Arc<RwLock<TensorData>>,
    b_node: Arc<RwLock<TensorData>>,
    a_shape: Vec<usize>,
    b_shape: Vec<usize>,
}

impl BackwardOp for MulBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, TensorGradError> {
        let a = Tensor {
            data: Arc::clone(&self.a_node),
        }
        .detach();
        let b = Tensor {
            data: Arc::clone(&self.b_node),
        }
        .detach();

        let grad_a = mul_op(grad_output, &b)?.reduce_to_shape(&self.a_shape)?;
        let grad_b = mul_op(grad_output, &a)?.reduce_to_shape(&self.b_shape)?;
        Ok(vec![grad_a, grad_b])
    }

    fn inputs(&self) -> Vec<Arc<RwLock<TensorData>>> {
        vec![Arc::clone(&self.a_node), Arc::clone(&self.b_node)]
    }

    fn name(&self) -> &'static str {
        "mul"
    }
}

/// Element-wise multiplication with broadcasting: `a ⊙ b`.
pub fn mul_op(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorGradError> {
    let a_shape = a.shape();
    let b_shape = b.shape();
    apply_binary_op(
        a,
        b,
        |x, y| x * y,
        |x, y| x * y,
        move |a_node, b_node| {
            Arc::new(MulBackward {
                a_node,
                b_node,
                a_shape,
                b_shape,
            })
        },
        "mul",
    )
}

/// Multiplies by a raw scalar, auto-wrapped as a constant leaf of `a`'s
/// dtype.
pub fn mul_op_scalar(a: &Tensor, scalar: f64) -> Result<Tensor, TensorGradError> {
    let s = scalar_tensor(scalar, a.dtype())?;
    mul_op(a, &s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{check_grad, GradCheckError};
    use crate::tensor::create::randn_f64;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_mul_forward_broadcast() {
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]).unwrap();
        let b = Tensor::new(vec![10.0, 100.0], vec![2]).unwrap();
        let c = mul_op(&a, &b).unwrap();
        assert_eq!(c.get_f32_data().unwrap(), vec![10.0, 200.0, 30.0, 400.0]);
    }

    #[test]
    fn test_mul_backward_swaps_operands() {
        let a = Tensor::new(vec![2.0, 3.0], vec![2]).unwrap();
        a.requires_grad_(true).unwrap();
        let b = Tensor::new(vec![5.0, 7.0], vec![2]).unwrap();
        b.requires_grad_(true).unwrap();

        let loss = mul_op(&a, &b).unwrap().sum().unwrap();
        loss.backward().unwrap();

        assert_eq!(a.grad().unwrap().get_f32_data().unwrap(), vec![5.0, 7.0]);
        assert_eq!(b.grad().unwrap().get_f32_data().unwrap(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_mul_scalar() {
        let a = Tensor::new(vec![1.0, 2.0], vec![2]).unwrap();
        let c = mul_op_scalar(&a, 3.0).unwrap();
        assert_eq!(c.get_f32_data().unwrap(), vec![3.0, 6.0]);
    }

    #[test]
    fn test_mul_finite_difference() -> Result<(), GradCheckError> {
        let mut rng = StdRng::seed_from_u64(7);
        let a = randn_f64(&[2, 3], &mut rng).unwrap();
        a.requires_grad_(true).unwrap();
        let b = randn_f64(&[3], &mut rng).unwrap();
        b.requires_grad_(true).unwrap();

        check_grad(
            |inputs| mul_op(&inputs[0], &inputs[1])?.sum(),
            &[a, b],
            1e-5,
            1e-4,
        )
    }
}
