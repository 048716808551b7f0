use crate::autograd::BackwardOp;
use crate::error::TensorGradError;
use crate::ops::apply_unary_op;
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use std::sync::{Arc, RwLock};

#[derive(Debug)]
struct NegBackward {
    a_node: Arc<RwLock<TensorData>>,
}

impl BackwardOp for NegBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, TensorGradError> {
        Ok(vec![neg_op(grad_output)?])
    }

    fn inputs(&self) -> Vec<Arc<RwLock<TensorData>>> {
        vec![Arc::clone(&self.a_node)]
    }

    fn name(&self) -> &'static str {
        "neg"
    }
}

/// Element-wise negation: `-a`.
pub fn neg_op(a: &Tensor) -> Result<Tensor, TensorGradError> {
    apply_unary_op(
        a,
        |x| -x,
        |x| -x,
        |a_node| Arc::new(NegBackward { a_node }),
        "neg",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{check_grad, GradCheckError};
    use crate::tensor::create::randn_f64;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_neg_forward() {
        let a = Tensor::new(vec![1.0, -2.0, 0.0], vec![3]).unwrap();
        let b = neg_op(&a).unwrap();
        assert_eq!(b.get_f32_data().unwrap(), vec![-1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_neg_backward() {
        let a = Tensor::new(vec![1.0, 2.0], vec![2]).unwrap();
        a.requires_grad_(true).unwrap();
        let loss = neg_op(&a).unwrap().sum().unwrap();
        loss.backward().unwrap();
        assert_eq!(a.grad().unwrap().get_f32_data().unwrap(), vec![-1.0, -1.0]);
    }

    #[test]
    fn test_neg_finite_difference() -> Result<(), GradCheckError> {
        let mut rng = StdRng::seed_from_u64(9);
        let a = randn_f64(&[4], &mut rng).unwrap();
        a.requires_grad_(true).unwrap();
        check_grad(|inputs| neg_op(&inputs[0])?.sum(), &[a], 1e-5, 1e-6)
    }
}
