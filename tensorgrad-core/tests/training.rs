//! End-to-end training loops over the public API: forward graph building,
//! backward accumulation, and in-place optimizer updates across steps.

use tensorgrad_core::autograd::collect_parameters;
use tensorgrad_core::ops::arithmetic::{add_op, pow_op, sub_op};
use tensorgrad_core::optim::{clip_grad_norm_, AdamW, AdamWConfig, Optimizer, Sgd};
use tensorgrad_core::Tensor;

#[test]
fn sgd_fits_a_scalar_factor() {
    // Fit w in y = w*x on three points of y = 2x. The squared loss is
    // 14*(w-2)^2, so plain SGD contracts (w-2) by a constant factor.
    let x = Tensor::new_f64(vec![1.0, 2.0, 3.0], vec![3]).unwrap();
    let y = Tensor::new_f64(vec![2.0, 4.0, 6.0], vec![3]).unwrap();
    let w = Tensor::new_f64(vec![0.0], vec![1]).unwrap();
    w.requires_grad_(true).unwrap();

    let mut opt = Sgd::new(vec![w.clone()], 0.01, 0.0).unwrap();
    for _ in 0..60 {
        let pred = tensorgrad_core::ops::arithmetic::mul_op(&w, &x).unwrap();
        let loss = pow_op(&sub_op(&pred, &y).unwrap(), 2.0).unwrap().sum().unwrap();
        loss.backward().unwrap();
        opt.step().unwrap();
        opt.zero_grad();
    }
    assert!((w.item_f64().unwrap() - 2.0).abs() < 1e-2);
}

#[test]
fn adamw_reduces_linear_regression_loss() {
    // One dense layer: X (4,2) · W (2,1), squared error against targets.
    let x = Tensor::new_f64(
        vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, -1.0],
        vec![4, 2],
    )
    .unwrap();
    let targets = Tensor::new_f64(vec![1.0, -1.0, 0.0, 3.0], vec![4, 1]).unwrap();
    let w = Tensor::new_f64(vec![0.1, -0.1], vec![2, 1]).unwrap();
    w.requires_grad_(true).unwrap();

    let loss_of = |w: &Tensor| {
        let pred = x.matmul(w).unwrap();
        pow_op(&sub_op(&pred, &targets).unwrap(), 2.0)
            .unwrap()
            .sum()
            .unwrap()
    };

    let initial = loss_of(&w).item_f64().unwrap();

    // Parameter discovery straight from the recorded graph.
    let first_loss = loss_of(&w);
    let params = collect_parameters(&first_loss).unwrap();
    assert_eq!(params.len(), 1);

    let config = AdamWConfig {
        lr: 0.05,
        ..Default::default()
    };
    let mut opt = AdamW::new(params, config).unwrap();
    for _ in 0..200 {
        let loss = loss_of(&w);
        loss.backward().unwrap();
        opt.step().unwrap();
        opt.zero_grad();
    }

    let trained = loss_of(&w).item_f64().unwrap();
    assert!(trained < initial * 0.05, "loss {} -> {}", initial, trained);
}

#[test]
fn clipping_scales_sibling_gradients_once_each() {
    // sum(w + b) gives both parameters the gradient 1; the global norm is
    // sqrt(2), so clipping to 0.5 must scale each gradient exactly once,
    // to 0.5/sqrt(2). A shared gradient buffer would get scaled twice.
    let w = Tensor::new_f64(vec![0.0], vec![1]).unwrap();
    w.requires_grad_(true).unwrap();
    let b = Tensor::new_f64(vec![0.0], vec![1]).unwrap();
    b.requires_grad_(true).unwrap();

    let loss = add_op(&w, &b).unwrap().sum().unwrap();
    loss.backward().unwrap();

    let norm = clip_grad_norm_(&[w.clone(), b.clone()], 0.5).unwrap();
    assert!((norm - 2.0_f64.sqrt()).abs() < 1e-10);

    let expected = 0.5 / 2.0_f64.sqrt();
    for param in [&w, &b] {
        let grad = param.grad().unwrap().get_f64_data().unwrap();
        assert!(
            (grad[0] - expected).abs() < 1e-5,
            "clipped gradient {} != {}",
            grad[0],
            expected
        );
    }
}

#[test]
fn backward_resets_reachable_gradients_each_pass() {
    // backward() zeroes the gradients of every node it reaches before
    // seeding, so repeated passes over the same leaf yield the fresh
    // derivative rather than a running sum.
    let w = Tensor::new_f64(vec![1.0], vec![1]).unwrap();
    w.requires_grad_(true).unwrap();

    let loss = |w: &Tensor| pow_op(w, 2.0).unwrap().sum().unwrap();
    loss(&w).backward().unwrap();
    loss(&w).backward().unwrap();
    assert_eq!(w.grad().unwrap().get_f64_data().unwrap(), vec![2.0]);

    let mut opt = Sgd::new(vec![w.clone()], 0.1, 0.0).unwrap();
    opt.zero_grad();
    assert!(w.grad().is_none());
}
