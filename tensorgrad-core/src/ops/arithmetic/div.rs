use crate::autograd::BackwardOp;
use crate::buffer::Buffer;
use crate::error::TensorGradError;
use crate::ops::apply_binary_op;
use crate::ops::arithmetic::{mul_op, neg_op};
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use std::sync::{Arc, RwLock};

/// Backward rule for division `a / b`:
/// `grad -> a: grad / b`, `grad -> b: -grad ⊙ a / b²`, each reduced back
/// over broadcast dimensions.
#[derive(Debug)]
struct DivBackward {
    a_node: Arc<RwLock<TensorData>>,
    b_node: Arc<RwLock<TensorData>>,
    a_shape: Vec<usize>,
    b_shape: Vec<usize>,
}

impl BackwardOp for DivBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, TensorGradError> {
        let a = Tensor {
            data: Arc::clone(&self.a_node),
        }
        .detach();
        let b = Tensor {
            data: Arc::clone(&self.b_node),
        }
        .detach();

        let grad_a = div_op(grad_output, &b)?.reduce_to_shape(&self.a_shape)?;

        let b_squared = mul_op(&b, &b)?;
        let grad_b = neg_op(&div_op(&mul_op(grad_output, &a)?, &b_squared)?)?
            .reduce_to_shape(&self.b_shape)?;
        Ok(vec![grad_a, grad_b])
    }

    fn inputs(&self) -> Vec<Arc<RwLock<TensorData>>> {
        vec![Arc::clone(&self.a_node), Arc::clone(&self.b_node)]
    }

    fn name(&self) -> &'static str {
        "div"
    }
}

fn check_no_zero_denominator(b: &Tensor) -> Result<(), TensorGradError> {
    let guard = b.read_data();
    let has_zero = match guard.buffer() {
        Buffer::F32(v) => v.iter().any(|&x| x == 0.0),
        Buffer::F64(v) => v.iter().any(|&x| x == 0.0),
    };
    if has_zero {
        return Err(TensorGradError::NumericDomain {
            operation: "div".to_string(),
            message: "division by zero".to_string(),
        });
    }
    Ok(())
}

/// Element-wise division with broadcasting: `a / b`.
///
/// # Errors
/// Fails eagerly with `NumericDomain` if any denominator element is zero.
pub fn div_op(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorGradError> {
    check_no_zero_denominator(b)?;
    let a_shape = a.shape();
    let b_shape = b.shape();
    apply_binary_op(
        a,
        b,
        |x, y| x / y,
        |x, y| x / y,
        move |a_node, b_node| {
            Arc::new(DivBackward {
                a_node,
                b_node,
                a_shape,
                b_shape,
            })
        },
        "div",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{check_grad, GradCheckError};
    use crate::ops::arithmetic::add_op_scalar;
    use crate::tensor::create::randn_f64;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_div_forward() {
        let a = Tensor::new(vec![6.0, 9.0], vec![2]).unwrap();
        let b = Tensor::new(vec![2.0, 3.0], vec![2]).unwrap();
        let c = div_op(&a, &b).unwrap();
        assert_eq!(c.get_f32_data().unwrap(), vec![3.0, 3.0]);
    }

    #[test]
    fn test_div_by_zero_is_domain_error() {
        let a = Tensor::new(vec![1.0], vec![1]).unwrap();
        let b = Tensor::new(vec![0.0], vec![1]).unwrap();
        let err = div_op(&a, &b).unwrap_err();
        assert!(matches!(err, TensorGradError::NumericDomain { .. }));
    }

    #[test]
    fn test_div_backward_values() {
        // d(a/b)/da = 1/b; d(a/b)/db = -a/b^2.
        let a = Tensor::new(vec![6.0], vec![1]).unwrap();
        a.requires_grad_(true).unwrap();
        let b = Tensor::new(vec![2.0], vec![1]).unwrap();
        b.requires_grad_(true).unwrap();

        let loss = div_op(&a, &b).unwrap().sum().unwrap();
        loss.backward().unwrap();

        assert_relative_eq!(a.grad().unwrap().get_f32_data().unwrap()[0], 0.5);
        assert_relative_eq!(b.grad().unwrap().get_f32_data().unwrap()[0], -1.5);
    }

    #[test]
    fn test_div_finite_difference() -> Result<(), GradCheckError> {
        let mut rng = StdRng::seed_from_u64(11);
        let a = randn_f64(&[2, 2], &mut rng).unwrap();
        a.requires_grad_(true).unwrap();
        // Keep denominators away from zero.
        let b = add_op_scalar(
            &randn_f64(&[2, 2], &mut rng).unwrap().relu().unwrap(),
            2.0,
        )
        .unwrap()
        .detach();
        b.requires_grad_(true).unwrap();

        check_grad(
            |inputs| div_op(&inputs[0], &inputs[1])?.sum(),
            &[a, b],
            1e-5,
            1e-4,
        )
    }
}
