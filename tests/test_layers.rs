// Integration tests for the dense layer: forward determinism, the
// forward/backward/update lifecycle, and gradient accumulation.

use approx::assert_relative_eq;
use gradnet::activations::Activation;
use gradnet::error::Error;
use gradnet::layers::{DenseLayer, Layer};
use gradnet::matrix::{approx_eq, Matrix, MatrixRead};
use gradnet::utils::SimpleRng;

fn fixed_layer(activation: Activation) -> DenseLayer {
    let weights = Matrix::from_vec(3, 2, vec![0.1, 0.4, 0.2, 0.5, 0.3, 0.6]).unwrap();
    let biases = Matrix::from_vec(1, 2, vec![0.1, 0.2]).unwrap();
    DenseLayer::with_parameters(3, 2, activation, weights, biases).unwrap()
}

#[test]
fn forward_determinism_fixed_parameters() {
    let mut layer = fixed_layer(Activation::None);
    let input = Matrix::from_vec(1, 3, vec![1.0, 2.0, 3.0]).unwrap();
    layer.forward(&input).unwrap();

    let output = layer.output().unwrap();
    assert_relative_eq!(output.at(0, 0), 1.5, epsilon = 1e-6);
    assert_relative_eq!(output.at(0, 1), 3.4, epsilon = 1e-6);
}

#[test]
fn forward_with_softmax_normalizes_rows() {
    let mut layer = fixed_layer(Activation::Softmax);
    let input = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, -1.0, 0.5, 2.0]).unwrap();
    layer.forward(&input).unwrap();

    let output = layer.output().unwrap();
    for r in 0..2 {
        let total: f32 = output.row(r).iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-5);
    }
}

#[test]
fn lifecycle_violations_fail_fast() {
    let mut layer = fixed_layer(Activation::None);
    let grad = Matrix::zeros(1, 2).unwrap();

    assert!(matches!(layer.backward(&grad), Err(Error::State(_))));
    assert!(matches!(layer.update(0.1), Err(Error::State(_))));

    let input = Matrix::from_vec(1, 3, vec![1.0, 2.0, 3.0]).unwrap();
    layer.forward(&input).unwrap();
    layer.backward(&grad).unwrap();
    layer.update(0.1).unwrap();

    // Gradients consumed: a second update without backward is a state error.
    assert!(matches!(layer.update(0.1), Err(Error::State(_))));
}

#[test]
fn split_minibatches_accumulate_like_one_batch() {
    let mut whole = fixed_layer(Activation::None);
    let mut split = fixed_layer(Activation::None);

    let batch =
        Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 0.5, -1.0, 2.0]).unwrap();
    let grad = Matrix::from_vec(2, 2, vec![1.0, -1.0, 0.5, 0.25]).unwrap();

    // One backward over the whole batch.
    whole.forward(&batch).unwrap();
    whole.backward(&grad).unwrap();

    // Two backwards over the row halves, no update in between.
    for r in 0..2 {
        let sample = batch.view(r, 0, 1, 3).unwrap();
        let sample_grad = grad.view(r, 0, 1, 2).unwrap();
        split.forward(&sample).unwrap();
        split.backward(&sample_grad).unwrap();
    }

    assert!(approx_eq(whole.grad_weights(), split.grad_weights(), 1e-5));
    assert!(approx_eq(whole.grad_biases(), split.grad_biases(), 1e-5));
}

#[test]
fn update_zeroes_accumulators_for_any_gradient() {
    let mut layer = fixed_layer(Activation::Tanh);
    let input = Matrix::from_vec(1, 3, vec![0.3, -0.7, 1.1]).unwrap();
    let grad = Matrix::from_vec(1, 2, vec![123.0, -456.0]).unwrap();

    layer.forward(&input).unwrap();
    layer.backward(&grad).unwrap();
    layer.update(0.001).unwrap();

    assert!(layer.grad_weights().buf().iter().all(|&g| g == 0.0));
    assert!(layer.grad_biases().buf().iter().all(|&g| g == 0.0));
}

#[test]
fn analytic_gradients_match_finite_differences() {
    // Check d(sum of outputs)/d(weight) numerically for a sigmoid layer.
    let mut rng = SimpleRng::new(77);
    let layer = DenseLayer::new(3, 2, Activation::Sigmoid, &mut rng).unwrap();
    let input = Matrix::from_vec(1, 3, vec![0.4, -0.2, 0.9]).unwrap();

    // Analytic: backward with an all-ones output gradient accumulates
    // d(sum)/dw into grad_weights.
    let weights = layer.weights().unwrap().clone();
    let biases = layer.biases().unwrap().clone();
    let mut analytic =
        DenseLayer::with_parameters(3, 2, Activation::Sigmoid, weights.clone(), biases.clone())
            .unwrap();
    analytic.forward(&input).unwrap();
    let ones = Matrix::from_vec(1, 2, vec![1.0, 1.0]).unwrap();
    analytic.backward(&ones).unwrap();

    let h = 1e-3f32;
    for i in 0..3 {
        for j in 0..2 {
            let run = |delta: f32| -> f32 {
                let mut perturbed = weights.clone();
                let current = perturbed.at(i, j);
                gradnet::matrix::MatrixWrite::set(&mut perturbed, i, j, current + delta);
                let mut probe = DenseLayer::with_parameters(
                    3,
                    2,
                    Activation::Sigmoid,
                    perturbed,
                    biases.clone(),
                )
                .unwrap();
                probe.forward(&input).unwrap();
                probe.output().unwrap().sum()
            };
            let numeric = (run(h) - run(-h)) / (2.0 * h);
            let got = analytic.grad_weights().at(i, j);
            assert!(
                (numeric - got).abs() < 1e-2,
                "dw[{i}][{j}]: numeric {numeric} vs analytic {got}"
            );
        }
    }
}
