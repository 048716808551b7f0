use crate::autograd::BackwardOp;
use crate::error::TensorGradError;
use crate::ops::apply_binary_op;
use crate::ops::arithmetic::neg_op;
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use std::sync::{Arc, RwLock};

/// Backward rule for subtraction: `grad` to the left operand, `-grad` to the
/// right, each reduced back over broadcast dimensions.
#[derive(Debug)]
struct SubBackward {
    a_node: Arc<RwLock<TensorData>>,
    b_node: Arc<RwLock<TensorData>>,
    a_shape: Vec<usize>,
    b_shape: Vec<usize>,
}

impl BackwardOp for SubBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, TensorGradError> {
        let grad_a = grad_output.reduce_to_shape(&self.a_shape)?;
        let grad_b = neg_op(grad_output)?.reduce_to_shape(&self.b_shape)?;
        Ok(vec![grad_a, grad_b])
    }

    fn inputs(&self) -> Vec<Arc<RwLock<TensorData>>> {
        vec![Arc::clone(&self.a_node), Arc::clone(&self.b_node)]
    }

    fn name(&self) -> &'static str {
        "sub"
    }
}

/// Element-wise subtraction with broadcasting: `a - b`.
pub fn sub_op(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorGradError> {
    let a_shape = a.shape();
    let b_shape = b.shape();
    apply_binary_op(
        a,
        b,
        |x, y| x - y,
        |x, y| x - y,
        move |a_node, b_node| {
            Arc::new(SubBackward {
                a_node,
                b_node,
                a_shape,
                b_shape,
            })
        },
        "sub",
    )
}
