//! End-to-end training behavior through the public API.

use approx::assert_relative_eq;
use backprop::{Activation, Error, LayerSpec, Logging, Model, StopReason};

fn xor_data() -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    (
        vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ],
        vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]],
    )
}

/// A 2-2-1 sigmoid network seeded next to a known XOR solution: one
/// roughly-OR neuron, one roughly-AND neuron, and an output that
/// subtracts the second from the first.
fn near_xor_model(error_threshold: f64, max_iterations: usize) -> Model {
    let mut model = Model::new()
        .learning_rate(0.5)
        .batch_size(4)
        .max_iterations(max_iterations)
        .error_threshold(error_threshold)
        .logging(Logging::Silent);
    model
        .add(
            LayerSpec::new(2, Activation::Sigmoid)
                .input_shape(2)
                .weights(vec![vec![10.0, 10.0, -5.0], vec![10.0, 10.0, -15.0]]),
        )
        .unwrap();
    model
        .add(LayerSpec::new(1, Activation::Sigmoid).weights(vec![vec![10.0, -20.0, -5.0]]))
        .unwrap();
    model
}

#[test]
fn xor_training_converges() {
    let (inputs, expected) = xor_data();
    let mut model = near_xor_model(0.05, 2000);
    let outcome = model.fit(&inputs, &expected).unwrap();
    assert_eq!(outcome, StopReason::Convergence);

    let outputs = model.predict(&inputs).unwrap();
    for (output, target) in outputs.iter().zip(&expected) {
        assert!((output[0] - target[0]).abs() < 0.2);
    }
}

#[test]
fn xor_training_from_random_weights_reports_an_outcome() {
    let (inputs, expected) = xor_data();
    let mut model = Model::new()
        .learning_rate(0.5)
        .batch_size(4)
        .max_iterations(2000)
        .error_threshold(0.05)
        .logging(Logging::Silent)
        .seed(17);
    model
        .add(LayerSpec::new(2, Activation::Sigmoid).input_shape(2))
        .unwrap();
    model.add(LayerSpec::new(1, Activation::Sigmoid)).unwrap();
    // Either terminal outcome is acceptable; the run must not degenerate.
    model.fit(&inputs, &expected).unwrap();
}

#[test]
fn unreachable_threshold_exhausts_the_iteration_cap() {
    let (inputs, expected) = xor_data();
    let mut model = near_xor_model(0.0, 3);
    let outcome = model.fit(&inputs, &expected).unwrap();
    assert_eq!(outcome, StopReason::MaxIterations);
}

#[test]
fn linear_regression_recovers_the_line() {
    // y = 2x + 1, sampled exactly on the line
    let inputs: Vec<Vec<f64>> = (0..5).map(|x| vec![x as f64]).collect();
    let expected: Vec<Vec<f64>> = (0..5).map(|x| vec![2.0 * x as f64 + 1.0]).collect();

    let mut model = Model::new()
        .learning_rate(0.02)
        .batch_size(5)
        .max_iterations(20_000)
        .error_threshold(1e-6)
        .logging(Logging::Silent);
    model
        .add(
            LayerSpec::new(1, Activation::Identity)
                .input_shape(1)
                .weights(vec![vec![0.0, 0.0]]),
        )
        .unwrap();
    let outcome = model.fit(&inputs, &expected).unwrap();
    assert_eq!(outcome, StopReason::Convergence);

    let weights = model.layers()[0].weights();
    assert_relative_eq!(weights[0][0], 2.0, epsilon = 0.05);
    assert_relative_eq!(weights[0][1], 1.0, epsilon = 0.05);
}

#[test]
fn one_small_update_reduces_the_error() {
    let inputs = vec![vec![1.0]];
    let expected = vec![vec![1.0]];
    let mut model = Model::new()
        .learning_rate(0.1)
        .batch_size(1)
        .max_iterations(1)
        .error_threshold(0.0)
        .logging(Logging::Silent);
    model
        .add(
            LayerSpec::new(1, Activation::Sigmoid)
                .input_shape(1)
                .weights(vec![vec![0.0, 0.0]]),
        )
        .unwrap();

    let before = model.predict(&inputs).unwrap()[0][0];
    let err_before = (before - 1.0) * (before - 1.0);
    model.fit(&inputs, &expected).unwrap();
    let after = model.predict(&inputs).unwrap()[0][0];
    let err_after = (after - 1.0) * (after - 1.0);
    assert!(err_after < err_before);
}

#[test]
fn identical_samples_average_to_the_single_sample_update() {
    let single_inputs = vec![vec![0.5]];
    let single_expected = vec![vec![2.0]];
    let batch_inputs: Vec<Vec<f64>> = (0..4).map(|_| vec![0.5]).collect();
    let batch_expected: Vec<Vec<f64>> = (0..4).map(|_| vec![2.0]).collect();

    let build = |batch_size: usize| -> Model {
        let mut model = Model::new()
            .learning_rate(0.3)
            .batch_size(batch_size)
            .max_iterations(1)
            .error_threshold(0.0)
            .logging(Logging::Silent);
        model
            .add(
                LayerSpec::new(1, Activation::Identity)
                    .input_shape(1)
                    .weights(vec![vec![1.0, -1.0]]),
            )
            .unwrap();
        model
    };

    let mut single = build(1);
    single.fit(&single_inputs, &single_expected).unwrap();
    let mut batched = build(4);
    batched.fit(&batch_inputs, &batch_expected).unwrap();

    assert_eq!(
        single.layers()[0].weights(),
        batched.layers()[0].weights()
    );
}

#[test]
fn inference_is_deterministic() {
    let mut model = Model::new().logging(Logging::Silent).seed(11);
    model
        .add(LayerSpec::new(3, Activation::Sigmoid).input_shape(4))
        .unwrap();
    model.add(LayerSpec::new(2, Activation::Softmax)).unwrap();

    let input = vec![vec![0.1, -0.2, 0.3, 0.4]];
    let first = model.predict(&input).unwrap();
    let second = model.predict(&input).unwrap();
    assert_eq!(first, second);
}

#[test]
fn non_finite_outputs_surface_instead_of_propagating() {
    let mut model = Model::new().logging(Logging::Silent);
    model
        .add(
            LayerSpec::new(1, Activation::Identity)
                .input_shape(1)
                .weights(vec![vec![f64::MAX, f64::MAX]]),
        )
        .unwrap();

    let inputs = vec![vec![2.0]];
    let expected = vec![vec![0.0]];
    assert!(matches!(
        model.predict(&inputs),
        Err(Error::NonFiniteOutput { .. })
    ));
    assert!(matches!(
        model.fit(&inputs, &expected),
        Err(Error::NonFiniteOutput { .. })
    ));
}

#[test]
fn runaway_learning_rate_fails_the_run() {
    let inputs = vec![vec![2.0]];
    let expected = vec![vec![0.0]];
    let mut model = Model::new()
        .learning_rate(1e200)
        .batch_size(1)
        .max_iterations(10)
        .error_threshold(0.0)
        .logging(Logging::Silent);
    model
        .add(
            LayerSpec::new(1, Activation::Identity)
                .input_shape(1)
                .weights(vec![vec![1.0, 0.0]]),
        )
        .unwrap();

    assert!(model.fit(&inputs, &expected).is_err());
}

#[test]
fn trained_models_round_trip_through_serde() {
    let (inputs, expected) = xor_data();
    let mut model = near_xor_model(0.05, 100);
    model.fit(&inputs, &expected).unwrap();
    let outputs = model.predict(&inputs).unwrap();

    let encoded = serde_json::to_string(&model).unwrap();
    let mut restored: Model = serde_json::from_str(&encoded).unwrap();
    assert_eq!(restored.predict(&inputs).unwrap(), outputs);
}
