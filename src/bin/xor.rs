use backprop::{Activation, LayerSpec, Logging, Model, StopReason};

fn main() {
    let inputs = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let expected = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];

    let mut model = Model::new()
        .learning_rate(0.5)
        .batch_size(4)
        .max_iterations(2000)
        .error_threshold(0.05)
        .logging(Logging::Iterations(100));
    model
        .add(LayerSpec::new(2, Activation::Sigmoid).input_shape(2))
        .unwrap();
    model
        .add(LayerSpec::new(1, Activation::Sigmoid))
        .unwrap();

    match model.fit(&inputs, &expected).unwrap() {
        StopReason::Convergence => println!("Converged on XOR."),
        StopReason::MaxIterations => println!("Ran out of iterations before converging."),
    }

    println!();
    for (input, output) in inputs.iter().zip(model.predict(&inputs).unwrap()) {
        println!("{:?} -> {:.3}", input, output[0]);
    }
}
