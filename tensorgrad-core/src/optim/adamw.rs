use crate::autograd::NodeId;
use crate::error::TensorGradError;
use crate::optim::grad_clipping::clip_grad_norm_;
use crate::optim::Optimizer;
use crate::tensor::Tensor;
use std::collections::HashMap;

/// Hyperparameters for [`AdamW`]. `Default` gives the commonly used
/// values: `lr = 1e-3`, `betas = (0.9, 0.999)`, `eps = 1e-8`, no weight
/// decay, no gradient clipping.
#[derive(Debug, Clone)]
pub struct AdamWConfig {
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    pub weight_decay: f64,
    /// When set, gradients are globally norm-clipped to this value before
    /// the moment updates.
    pub max_grad_norm: Option<f64>,
}

impl Default for AdamWConfig {
    fn default() -> Self {
        AdamWConfig {
            lr: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 0.0,
            max_grad_norm: None,
        }
    }
}

/// Adam with decoupled weight decay.
///
/// Per element: `m ← β₁·m + (1−β₁)·g`, `v ← β₂·v + (1−β₂)·g²`, bias
/// correction `m̂ = m/(1−β₁ᵗ)`, `v̂ = v/(1−β₂ᵗ)`, then
/// `p ← p − η·(m̂/(√v̂ + ε) + λ·p)` where the decay term acts on the
/// parameter directly rather than through the gradient.
#[derive(Debug)]
pub struct AdamW {
    params: Vec<Tensor>,
    config: AdamWConfig,
    /// First and second moment estimates per parameter.
    moments: HashMap<NodeId, (Vec<f64>, Vec<f64>)>,
    step_count: u64,
}

impl AdamW {
    /// Creates an AdamW optimizer over the given parameter leaves.
    ///
    /// # Errors
    /// `ConfigurationError` for a non-positive `lr` or `eps`, betas outside
    /// `[0, 1)`, a negative `weight_decay`, or a non-positive clipping norm.
    pub fn new(params: Vec<Tensor>, config: AdamWConfig) -> Result<Self, TensorGradError> {
        if !(config.lr.is_finite() && config.lr > 0.0) {
            return Err(TensorGradError::ConfigurationError(format!(
                "learning rate must be positive and finite, got {}",
                config.lr
            )));
        }
        for (name, beta) in [("beta1", config.beta1), ("beta2", config.beta2)] {
            if !(0.0..1.0).contains(&beta) {
                return Err(TensorGradError::ConfigurationError(format!(
                    "{} must be in [0, 1), got {}",
                    name, beta
                )));
            }
        }
        if !(config.eps.is_finite() && config.eps > 0.0) {
            return Err(TensorGradError::ConfigurationError(format!(
                "eps must be positive and finite, got {}",
                config.eps
            )));
        }
        if !(config.weight_decay.is_finite() && config.weight_decay >= 0.0) {
            return Err(TensorGradError::ConfigurationError(format!(
                "weight_decay must be non-negative and finite, got {}",
                config.weight_decay
            )));
        }
        if let Some(max_norm) = config.max_grad_norm {
            if !(max_norm.is_finite() && max_norm > 0.0) {
                return Err(TensorGradError::ConfigurationError(format!(
                    "max_grad_norm must be positive and finite, got {}",
                    max_norm
                )));
            }
        }
        Ok(AdamW {
            params,
            config,
            moments: HashMap::new(),
            step_count: 0,
        })
    }
}

impl Optimizer for AdamW {
    fn step(&mut self) -> Result<(), TensorGradError> {
        if let Some(max_norm) = self.config.max_grad_norm {
            clip_grad_norm_(&self.params, max_norm)?;
        }
        self.step_count += 1;
        let t = self.step_count as i32;
        let bias1 = 1.0 - self.config.beta1.powi(t);
        let bias2 = 1.0 - self.config.beta2.powi(t);

        for param in &self.params {
            let Some(grad) = param.grad() else {
                log::debug!("adamw: skipping parameter with empty gradient accumulator");
                continue;
            };
            let g = grad.to_f64_vec()?;
            let mut p = param.to_f64_vec()?;

            let (m, v) = self
                .moments
                .entry(param.node_id())
                .or_insert_with(|| (vec![0.0; g.len()], vec![0.0; g.len()]));

            for i in 0..g.len() {
                m[i] = self.config.beta1 * m[i] + (1.0 - self.config.beta1) * g[i];
                v[i] = self.config.beta2 * v[i] + (1.0 - self.config.beta2) * g[i] * g[i];
                let m_hat = m[i] / bias1;
                let v_hat = v[i] / bias2;
                p[i] -= self.config.lr
                    * (m_hat / (v_hat.sqrt() + self.config.eps)
                        + self.config.weight_decay * p[i]);
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
