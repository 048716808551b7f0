use crate::autograd::BackwardOp;
use crate::buffer::Buffer;
use crate::error::TensorGradError;
use crate::ops::apply_unary_op;
use crate::ops::arithmetic::{mul_op, mul_op_scalar};
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use std::sync::{Arc, RwLock};

/// Backward rule for `a^p` with a constant exponent:
/// `grad -> a: grad ⊙ p ⊙ a^(p-1)`.
#[derive(Debug)]
struct PowBackward {
    a_node: Arc<RwLock<TensorData>>,
    exponent: f64,
}

impl BackwardOp for PowBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, TensorGradError> {
        let a = Tensor {
            data: Arc::clone(&self.a_node),
        }
        .detach();
        let derivative = mul_op_scalar(&pow_op(&a, self.exponent - 1.0)?, self.exponent)?;
        Ok(vec![mul_op(grad_output, &derivative)?])
    }

    fn inputs(&self) -> Vec<Arc<RwLock<TensorData>>> {
        vec![Arc::clone(&self.a_node)]
    }

    fn name(&self) -> &'static str {
        "pow"
    }
}

fn check_pow_domain(a: &Tensor, exponent: f64) -> Result<(), TensorGradError> {
    if exponent.fract() == 0.0 {
        return Ok(());
    }
    let guard = a.read_data();
    let has_non_positive = match guard.buffer() {
        Buffer::F32(v) => v.iter().any(|&x| x <= 0.0),
        Buffer::F64(v) => v.iter().any(|&x| x <= 0.0),
    };
    if has_non_positive {
        return Err(TensorGradError::NumericDomain {
            operation: "pow".to_string(),
            message: format!(
                "non-positive base with fractional exponent {}",
                exponent
            ),
        });
    }
    Ok(())
}

/// Element-wise power with a constant scalar exponent: `a^p`.
///
/// The exponent is not a graph node; no gradient flows to it.
///
/// # Errors
/// Fails eagerly with `NumericDomain` for a non-positive base combined with
/// a fractional exponent (undefined in the reals).
pub fn pow_op(a: &Tensor, exponent: f64) -> Result<Tensor, TensorGradError> {
    check_pow_domain(a, exponent)?;
    let exp_f32 = exponent as f32;
    apply_unary_op(
        a,
        move |x| x.powf(exp_f32),
        move |x| x.powf(exponent),
        move |a_node| Arc::new(PowBackward { a_node, exponent }),
        "pow",
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
    fn test_pow_forward() {
        let a = Tensor::new(vec![2.0, 3.0], vec![2]).unwrap();
        let b = pow_op(&a, 2.0).unwrap();
        assert_eq!(b.get_f32_data().unwrap(), vec![4.0, 9.0]);
    }

    #[test]
    fn test_pow_negative_base_integer_exponent_ok() {
        let a = Tensor::new(vec![-2.0], vec![1]).unwrap();
        let b = pow_op(&a, 3.0).unwrap();
        assert_eq!(b.get_f32_data().unwrap(), vec![-8.0]);
    }

    #[test]
    fn test_pow_fractional_exponent_domain_error() {
        let a = Tensor::new(vec![-1.0, 4.0], vec![2]).unwrap();
        let err = pow_op(&a, 0.5).unwrap_err();
        assert!(matches!(err, TensorGradError::NumericDomain { .. }));
    }

    #[test]
    fn test_pow_backward() {
        // d(a^3)/da = 3a^2.
        let a = Tensor::new(vec![2.0], vec![1]).unwrap();
        a.requires_grad_(true).unwrap();
        let loss = pow_op(&a, 3.0).unwrap().sum().unwrap();
        loss.backward().unwrap();
        assert_relative_eq!(a.grad().unwrap().get_f32_data().unwrap()[0], 12.0);
    }

    #[test]
    fn test_pow_finite_difference() -> Result<(), GradCheckError> {
        let mut rng = StdRng::seed_from_u64(13);
        // Strictly positive base so the fractional exponent stays in domain.
        let base = add_op_scalar(
            &randn_f64(&[2, 2], &mut rng).unwrap().relu().unwrap(),
            1.0,
        )
        .unwrap()
        .detach();
        base.requires_grad_(true).unwrap();

        check_grad(|inputs| pow_op(&inputs[0], 2.5)?.sum(), &[base], 1e-5, 1e-4)
    }
}
