use crate::autograd::BackwardOp;
use crate::error::TensorGradError;
use crate::ops::apply_unary_op;
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use crate::types::DType;
use std::sync::{Arc, RwLock};

/// Backward rule for ReLU: the gradient passes through where the input was
/// strictly positive and is zeroed elsewhere. At exactly zero the
/// subgradient 0 is used.
#[derive(Debug)]
struct ReluBackward {
    a_node: Arc<RwLock<TensorData>>,
}

impl BackwardOp for ReluBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, TensorGradError> {
        let input = Tensor {
            data: Arc::clone(&self.a_node),
        }
        .detach();
        let shape = input.shape();

        let grad = match input.dtype() {
            DType::F32 => {
                let x = input.get_f32_data()?;
                let g = grad_output.get_f32_data()?;
                let data: Vec<f32> = x
                    .iter()
                    .zip(&g)
                    .map(|(&x, &g)| if x > 0.0 { g } else { 0.0 })
                    .collect();
                Tensor::new(data, shape)?
            }
            DType::F64 => {
                let x = input.get_f64_data()?;
                let g = grad_output.get_f64_data()?;
                let data: Vec<f64> = x
                    .iter()
                    .zip(&g)
                    .map(|(&x, &g)| if x > 0.0 { g } else { 0.0 })
                    .collect();
                Tensor::new_f64(data, shape)?
            }
        };
        Ok(vec![grad])
    }

    fn inputs(&self) -> Vec<Arc<RwLock<TensorData>>> {
        vec![Arc::clone(&self.a_node)]
    }

    fn name(&self) -> &'static str {
        "relu"
    }
}

/// Rectified linear unit, `max(x, 0)` element-wise.
pub fn relu_op(a: &Tensor) -> Result<Tensor, TensorGradError> {
    apply_unary_op(
        a,
        |x| x.max(0.0),
        |x| x.max(0.0),
        |a_node| Arc::new(ReluBackward { a_node }),
        "relu",
    )
}

impl Tensor {
    /// See [`relu_op`].
    pub fn relu(&self) -> Result<Tensor, TensorGradError> {
        relu_op(self)
    }
}
