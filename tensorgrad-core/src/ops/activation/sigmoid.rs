use crate::autograd::BackwardOp;
use crate::error::TensorGradError;
use crate::ops::arithmetic::{mul_op, sub_op};
use crate::tensor::create::ones_like;
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use crate::types::DType;
use std::sync::{Arc, RwLock};

/// Backward rule for the logistic sigmoid, expressed through the forward
/// output: `dσ/dx = σ(x)·(1 − σ(x))`.
///
/// The captured output is a detached copy; capturing the graph node itself
/// would make the node own a reference to itself through its own grad_fn
/// and the cycle would never be freed.
#[derive(Debug)]
struct SigmoidBackward {
    a_node: Arc<RwLock<TensorData>>,
    output: Tensor,
}

impl BackwardOp for SigmoidBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, TensorGradError> {
        let one_minus = sub_op(&ones_like(&self.output)?, &self.output)?;
        let local = mul_op(&self.output, &one_minus)?;
        Ok(vec![mul_op(grad_output, &local)?])
    }

    fn inputs(&self) -> Vec<Arc<RwLock<TensorData>>> {
        vec![Arc::clone(&self.a_node)]
    }

    fn name(&self) -> &'static str {
        "sigmoid"
    }
}

// Evaluated branch-wise so that exp never overflows: exp(-x) for x >= 0,
// exp(x) for x < 0.
fn stable_sigmoid_f64(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

fn stable_sigmoid_f32(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Logistic sigmoid, `1 / (1 + e^{-x})` element-wise.
pub fn sigmoid_op(a: &Tensor) -> Result<Tensor, TensorGradError> {
    let guard = a.read_data();
    let shape = guard.shape.clone();
    let offset = guard.offset;
    let numel = guard.numel();
    let requires_grad = guard.requires_grad;

    let output = match guard.dtype {
        DType::F32 => {
            let buf = guard.buffer().try_get_f32()?;
            let data: Vec<f32> = buf[offset..offset + numel]
                .iter()
                .map(|&x| stable_sigmoid_f32(x))
                .collect();
            drop(guard);
            Tensor::new(data, shape)?
        }
        DType::F64 => {
            let buf = guard.buffer().try_get_f64()?;
            let data: Vec<f64> = buf[offset..offset + numel]
                .iter()
                .map(|&x| stable_sigmoid_f64(x))
                .collect();
            drop(guard);
            Tensor::new_f64(data, shape)?
        }
    };

    if requires_grad {
        output.set_grad_fn(Arc::new(SigmoidBackward {
            a_node: Arc::clone(&a.data),
            output: output.detach(),
        }));
    }
    Ok(output)
}

impl Tensor {
    /// See [`sigmoid_op`].
    pub fn sigmoid(&self) -> Result<Tensor, TensorGradError> {
        sigmoid_op(self)
    }
}
