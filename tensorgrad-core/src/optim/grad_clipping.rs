use crate::error::TensorGradError;
use crate::tensor::Tensor;

/// Scales all gradients in place so that their global L2 norm does not
/// exceed `max_norm`. Returns the norm measured before clipping.
/// Parameters without an accumulated gradient are skipped.
pub fn clip_grad_norm_(params: &[Tensor], max_norm: f64) -> Result<f64, TensorGradError> {
    if !(max_norm.is_finite() && max_norm > 0.0) {
        return Err(TensorGradError::ConfigurationError(format!(
            "max_norm must be positive and finite, got {}",
            max_norm
        )));
    }

    let mut total_sq = 0.0f64;
    for param in params {
        if let Some(grad) = param.grad() {
            for v in grad.to_f64_vec()? {
                total_sq += v * v;
            }
        }
    }
    let total_norm = total_sq.sqrt();

    if total_norm > max_norm {
        let scale = max_norm / (total_norm + 1e-6);
        for param in params {
            if let Some(grad) = param.grad() {
                let scaled: Vec<f64> = grad.to_f64_vec()?.into_iter().map(|v| v * scale).collect();
                grad.set_data_from_f64(scaled)?;
            }
        }
    }
    Ok(total_norm)
}

/// Clamps every gradient element in place to `[-clip_value, clip_value]`.
pub fn clip_grad_value_(params: &[Tensor], clip_value: f64) -> Result<(), TensorGradError> {
    if !(clip_value.is_finite() && clip_value > 0.0) {
        return Err(TensorGradError::ConfigurationError(format!(
            "clip_value must be positive and finite, got {}",
            clip_value
        )));
    }
    for param in params {
        if let Some(grad) = param.grad() {
            let clamped: Vec<f64> = grad
                .to_f64_vec()?
                .into_iter()
                .map(|v| v.clamp(-clip_value, clip_value))
                .collect();
            grad.set_data_from_f64(clamped)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn param_with_grad(values: Vec<f64>) -> Tensor {
        let n = values.len();
        let p = Tensor::new_f64(vec![0.0; n], vec![n]).unwrap();
        p.requires_grad_(true).unwrap();
        p.acc_grad(Tensor::new_f64(values, vec![n]).unwrap()).unwrap();
        p
    }

    #[test]
    fn test_clip_grad_norm_scales_down() {
        let p = param_with_grad(vec![3.0, 4.0]); // norm 5
        let norm = clip_grad_norm_(std::slice::from_ref(&p), 1.0).unwrap();
        assert_relative_eq!(norm, 5.0, epsilon = 1e-12);
        let clipped = p.grad().unwrap().get_f64_data().unwrap();
        let new_norm = (clipped[0] * clipped[0] + clipped[1] * clipped[1]).sqrt();
        assert_relative_eq!(new_norm, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_clip_grad_norm_leaves_small_gradients() {
        let p = param_with_grad(vec![0.3, 0.4]);
        clip_grad_norm_(std::slice::from_ref(&p), 1.0).unwrap();
        assert_eq!(p.grad().unwrap().get_f64_data().unwrap(), vec![0.3, 0.4]);
    }

    #[test]
    fn test_clip_grad_value() {
        let p = param_with_grad(vec![-2.0, 0.5, 3.0]);
        clip_grad_value_(std::slice::from_ref(&p), 1.0).unwrap();
        assert_eq!(
            p.grad().unwrap().get_f64_data().unwrap(),
            vec![-1.0, 0.5, 1.0]
        );
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let p = param_with_grad(vec![1.0]);
        assert!(clip_grad_norm_(std::slice::from_ref(&p), 0.0).is_err());
        assert!(clip_grad_value_(std::slice::from_ref(&p), f64::NAN).is_err());
    }
}
