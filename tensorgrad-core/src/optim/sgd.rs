use crate::autograd::NodeId;
use crate::error::TensorGradError;
use crate::optim::Optimizer;
use crate::tensor::Tensor;
use std::collections::HashMap;

/// Stochastic gradient descent with optional momentum.
///
/// Update rule (momentum `μ`, learning rate `η`):
/// `v ← μ·v + g`, `p ← p − η·v`; with `μ = 0` this degenerates to plain
/// gradient descent. All arithmetic is carried out in f64 and written back
/// in the parameter's own dtype.
#[derive(Debug)]
pub struct Sgd {
    params: Vec<Tensor>,
    lr: f64,
    momentum: f64,
    momentum_buffers: HashMap<NodeId, Vec<f64>>,
}

impl Sgd {
    /// Creates an SGD optimizer over the given parameter leaves.
    ///
    /// # Errors
    /// `ConfigurationError` if `lr` is not positive and finite or
    /// `momentum` is outside `[0, 1)`.
    pub fn new(params: Vec<Tensor>, lr: f64, momentum: f64) -> Result<Self, TensorGradError> {
        if !(lr.is_finite() && lr > 0.0) {
            return Err(TensorGradError::ConfigurationError(format!(
                "learning rate must be positive and finite, got {}",
                lr
            )));
        }
        if !(0.0..1.0).contains(&momentum) {
            return Err(TensorGradError::ConfigurationError(format!(
                "momentum must be in [0, 1), got {}",
                momentum
            )));
        }
        Ok(Sgd {
            params,
            lr,
            momentum,
            momentum_buffers: HashMap::new(),
        })
    }
}

impl Optimizer for Sgd {
    fn step(&mut self) -> Result<(), TensorGradError> {
        for param in &self.params {
            let Some(grad) = param.grad() else {
                log::debug!("sgd: skipping parameter with empty gradient accumulator");
                continue;
            };
            let g = grad.to_f64_vec()?;
            let mut p = param.to_f64_vec()?;

            let direction: Vec<f64> = if self.momentum > 0.0 {
                let buf = self
                    .momentum_buffers
                    .entry(param.node_id())
                    .or_insert_with(|| vec![0.0; g.len()]);
                for (b, &g) in buf.iter_mut().zip(&g) {
                    *b = self.momentum * *b + g;
                }
                buf.clone()
            } else {
                g
            };

            for (p, d) in p.iter_mut().zip(&direction) {
                *p -= self.lr * d;
            }
            param.set_data_from_f64(p)?;
        }
        Ok(())
    }

    fn zero_grad(&mut self) {
        for param in &self.params {
            param.zero_grad();
        }
    }
}
