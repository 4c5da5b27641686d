//! The model: an ordered sequence of layers plus the mini-batch training
//! loop that drives them.

use itertools::zip_eq;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::layer::{Layer, LayerSpec, Role};

/// How a training run ended. The two outcomes partition the space:
/// either the total error crossed below the threshold, or the iteration
/// cap ran out first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Total squared error fell below the configured threshold.
    Convergence,
    /// The configured number of epochs ran without converging.
    MaxIterations,
}

/// Logging frequency to use during training
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub enum Logging {
    /// No logs will be printed
    Silent,
    /// A summary will be printed at completion
    Completion,
    /// A summary will be printed after every `n` training iterations
    Iterations(usize),
}

impl Logging {
    /// Performs logging at the current `iteration` of training.
    fn iteration(&self, iteration: usize, total_err: f64) {
        if let Logging::Iterations(freq) = *self {
            if freq > 0 && iteration % freq == 0 {
                println!("Iteration {}:\ttotal_err={}", iteration, total_err);
            }
        }
    }

    /// Performs logging at the end of training.
    fn completion(&self, iterations: usize, total_err: f64, reason: StopReason) {
        if let Logging::Silent = *self {
            return;
        }
        match reason {
            StopReason::Convergence => {
                println!("Converged after {} iterations.", iterations);
            }
            StopReason::MaxIterations => {
                println!("Iteration cap hit after {} iterations.", iterations);
            }
        }
        println!("Final total squared error: {}", total_err);
    }
}

/// A feed-forward model: layers plus the hyperparameters that drive
/// mini-batch gradient descent. The model is the unit of persistence for
/// a trained network.
#[derive(Debug, Serialize, Deserialize)]
pub struct Model {
    layers: Vec<Layer>,
    learning_rate: f64,
    batch_size: usize,
    max_iterations: usize,
    error_threshold: f64,
    logging: Logging,
    #[serde(skip, default = "entropy_rng")]
    rng: StdRng,
}

fn entropy_rng() -> StdRng {
    StdRng::from_entropy()
}

impl Model {
    /// Creates an empty model.
    ///
    /// The model is initialized with some default values. These defaults
    /// are:
    ///
    /// * A learning rate of 0.1.
    /// * A batch size of 10.
    /// * At most 100 training iterations.
    /// * An error threshold of 0.1.
    /// * Logs on training completion.
    pub fn new() -> Self {
        Model {
            layers: Vec::new(),
            learning_rate: 0.1,
            batch_size: 10,
            max_iterations: 100,
            error_threshold: 0.1,
            logging: Logging::Completion,
            rng: entropy_rng(),
        }
    }

    /// Sets the learning rate to use during gradient descent.
    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    /// Sets the mini-batch size. Gradients accumulate across a batch and
    /// are averaged by this divisor when applied.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the maximum number of training epochs.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the total-squared-error threshold below which training stops.
    pub fn error_threshold(mut self, error_threshold: f64) -> Self {
        self.error_threshold = error_threshold;
        self
    }

    /// Sets the type of logging to be emitted during training.
    pub fn logging(mut self, logging: Logging) -> Self {
        self.logging = logging;
        self
    }

    /// Seeds weight initialization and batch shuffling, making training
    /// runs reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// The assembled layers, in forward order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Appends a layer, wiring its input shape from the current last
    /// layer. The first layer must declare its own shape. The newest
    /// layer becomes the output layer; its predecessor is re-tagged as
    /// hidden.
    pub fn add(&mut self, spec: LayerSpec) -> Result<(), Error> {
        let wired_shape = self.layers.last().map(|layer| layer.output_shape());
        let layer = spec.assemble(wired_shape, &mut self.rng)?;
        if let Some(prev) = self.layers.last_mut() {
            prev.set_role(Role::Hidden);
        }
        self.layers.push(layer);
        Ok(())
    }

    /// Threads `input` through every layer, appending each layer's bias
    /// constant along the way, and returns the output layer's values.
    pub fn single_predict(&mut self, input: &[f64]) -> Result<Vec<f64>, Error> {
        self.check_input_dims(input)?;
        self.feed_forward(input)
    }

    /// Runs inference for every input, preserving cardinality and order.
    pub fn predict(&mut self, inputs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, Error> {
        for input in inputs {
            self.check_input_dims(input)?;
        }
        inputs.iter().map(|input| self.feed_forward(input)).collect()
    }

    /// Trains the model with mini-batch gradient descent.
    ///
    /// Each epoch shuffles the samples, walks them in chunks of at most
    /// `batch_size` (accumulating per-sample gradients and applying the
    /// averaged update after every chunk), and then measures total
    /// squared error over the whole training set. Training ends when the
    /// error crosses below the threshold or the iteration cap runs out,
    /// whichever comes first.
    pub fn fit(&mut self, inputs: &[Vec<f64>], expected: &[Vec<f64>]) -> Result<StopReason, Error> {
        self.validate(inputs, expected)?;

        let mut total_err = 0.0;
        for iteration in 1..=self.max_iterations {
            let mut permutation: Vec<usize> = (0..inputs.len()).collect();
            permutation.shuffle(&mut self.rng);

            for batch in permutation.chunks(self.batch_size) {
                self.multi_propagate(batch, inputs, expected)?;
                self.update_weights();
            }

            total_err = self.total_squared_error(inputs, expected)?;
            self.logging.iteration(iteration, total_err);
            if total_err < self.error_threshold {
                self.logging
                    .completion(iteration, total_err, StopReason::Convergence);
                return Ok(StopReason::Convergence);
            }
        }
        self.logging
            .completion(self.max_iterations, total_err, StopReason::MaxIterations);
        Ok(StopReason::MaxIterations)
    }

    /// Verifies every configuration precondition before the first epoch,
    /// so a training run either starts clean or fails immediately.
    fn validate(&self, inputs: &[Vec<f64>], expected: &[Vec<f64>]) -> Result<(), Error> {
        let (first, last) = match (self.layers.first(), self.layers.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(Error::EmptyModel),
        };
        if self.batch_size == 0 {
            return Err(Error::InvalidBatchSize);
        }
        if inputs.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }
        if inputs.len() != expected.len() {
            return Err(Error::shape(
                "expected-output count",
                inputs.len(),
                expected.len(),
            ));
        }
        for input in inputs {
            if input.len() != first.input_shape() {
                return Err(Error::shape(
                    "input vector",
                    first.input_shape(),
                    input.len(),
                ));
            }
        }
        for targets in expected {
            if targets.len() != last.output_shape() {
                return Err(Error::shape(
                    "expected-output vector",
                    last.output_shape(),
                    targets.len(),
                ));
            }
        }
        Ok(())
    }

    fn check_input_dims(&self, input: &[f64]) -> Result<(), Error> {
        let expected = match self.layers.first() {
            Some(layer) => layer.input_shape(),
            None => return Err(Error::EmptyModel),
        };
        if input.len() != expected {
            return Err(Error::shape("input vector", expected, input.len()));
        }
        Ok(())
    }

    fn feed_forward(&mut self, input: &[f64]) -> Result<Vec<f64>, Error> {
        let mut values = input.to_vec();
        for (index, layer) in self.layers.iter_mut().enumerate() {
            values.push(layer.bias());
            values = layer.forward(&values, index)?;
        }
        Ok(values)
    }

    /// Reconstructs the value vector layer `index` consumed in the last
    /// forward pass: the previous layer's cached outputs (or the raw
    /// sample input for the first layer) extended with the bias constant.
    fn prev_values(&self, index: usize, input: &[f64]) -> Vec<f64> {
        let mut values = if index == 0 {
            input.to_vec()
        } else {
            self.layers[index - 1].values()
        };
        values.push(self.layers[index].bias());
        values
    }

    /// Single-sample training step: forward to populate every neuron's
    /// cached value, then the backward rules from the output layer in.
    fn propagate(&mut self, input: &[f64], expected: &[f64]) -> Result<(), Error> {
        self.feed_forward(input)?;
        let rate = self.learning_rate;
        for index in (0..self.layers.len()).rev() {
            let prev_values = self.prev_values(index, input);
            let (head, tail) = self.layers.split_at_mut(index + 1);
            let layer = &mut head[index];
            match tail.first() {
                None => layer.backward_output(expected, &prev_values, rate),
                Some(next) => layer.backward_hidden(next.neurons(), &prev_values, rate),
            }
        }
        Ok(())
    }

    /// Mini-batch step: per-sample propagation with scratch resets in
    /// between; pending gradients accumulate across the whole batch.
    fn multi_propagate(
        &mut self,
        batch: &[usize],
        inputs: &[Vec<f64>],
        expected: &[Vec<f64>],
    ) -> Result<(), Error> {
        for &sample in batch {
            self.propagate(&inputs[sample], &expected[sample])?;
            for layer in &mut self.layers {
                layer.reset_scratch();
            }
        }
        Ok(())
    }

    /// Applies the averaged pending gradients across every layer. The
    /// divisor is the configured batch size even for a short final chunk.
    fn update_weights(&mut self) {
        for layer in &mut self.layers {
            layer.update_weights(self.batch_size);
        }
    }

    /// Total squared error over the full training set.
    fn total_squared_error(
        &mut self,
        inputs: &[Vec<f64>],
        expected: &[Vec<f64>],
    ) -> Result<f64, Error> {
        let mut total_err = 0.0;
        for (input, targets) in zip_eq(inputs, expected) {
            let outputs = self.feed_forward(input)?;
            for (output, target) in zip_eq(&outputs, targets) {
                total_err += (output - target) * (output - target);
            }
        }
        if !total_err.is_finite() {
            return Err(Error::NonFiniteError);
        }
        Ok(total_err)
    }
}

impl Default for Model {
    fn default() -> Self {
        Model::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activator::Activation;

    fn silent_model() -> Model {
        Model::new().logging(Logging::Silent).seed(3)
    }

    fn passthrough_model() -> Model {
        let mut model = silent_model();
        model
            .add(
                LayerSpec::new(1, Activation::Identity)
                    .input_shape(1)
                    .weights(vec![vec![2.0, 0.0]]),
            )
            .unwrap();
        model
    }

    #[test]
    fn first_layer_requires_input_shape() {
        let mut model = silent_model();
        assert!(matches!(
            model.add(LayerSpec::new(2, Activation::Sigmoid)),
            Err(Error::MissingInputShape)
        ));
    }

    #[test]
    fn add_wires_the_input_shape_through() {
        let mut model = silent_model();
        model
            .add(LayerSpec::new(3, Activation::Sigmoid).input_shape(2))
            .unwrap();
        model.add(LayerSpec::new(1, Activation::Sigmoid)).unwrap();
        assert_eq!(model.layers()[1].input_shape(), 3);
        for layer in model.layers() {
            for neuron in layer.neurons() {
                assert_eq!(neuron.weights().len(), layer.input_shape() + 1);
            }
        }
    }

    #[test]
    fn fit_rejects_an_empty_model() {
        let mut model = silent_model();
        assert!(matches!(
            model.fit(&[vec![0.0]], &[vec![0.0]]),
            Err(Error::EmptyModel)
        ));
    }

    #[test]
    fn fit_rejects_mismatched_cardinalities() {
        let mut model = passthrough_model();
        assert!(matches!(
            model.fit(&[vec![0.0], vec![1.0]], &[vec![0.0]]),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn fit_rejects_wrong_input_width() {
        let mut model = passthrough_model();
        assert!(matches!(
            model.fit(&[vec![0.0, 1.0]], &[vec![0.0]]),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn fit_rejects_wrong_output_width() {
        let mut model = passthrough_model();
        assert!(matches!(
            model.fit(&[vec![0.0]], &[vec![0.0, 1.0]]),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn fit_rejects_zero_batch_size() {
        let mut model = passthrough_model().batch_size(0);
        assert!(matches!(
            model.fit(&[vec![0.0]], &[vec![0.0]]),
            Err(Error::InvalidBatchSize)
        ));
    }

    #[test]
    fn fit_rejects_an_empty_training_set() {
        let mut model = passthrough_model();
        assert!(matches!(model.fit(&[], &[]), Err(Error::EmptyTrainingSet)));
    }

    #[test]
    fn predict_rejects_wrong_input_width() {
        let mut model = passthrough_model();
        assert!(matches!(
            model.predict(&[vec![0.0, 1.0]]),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn predict_preserves_order_and_cardinality() {
        let mut model = passthrough_model();
        let outputs = model
            .predict(&[vec![1.0], vec![2.0], vec![3.0]])
            .unwrap();
        assert_eq!(outputs, vec![vec![2.0], vec![4.0], vec![6.0]]);
    }

    #[test]
    fn single_predict_matches_batched_inference() {
        let mut model = passthrough_model();
        let single = model.single_predict(&[3.0]).unwrap();
        let batched = model.predict(&[vec![3.0]]).unwrap();
        assert_eq!(single, batched[0]);
    }

    #[test]
    fn bias_constant_is_appended_to_every_layer_input() {
        let mut model = silent_model();
        model
            .add(
                LayerSpec::new(1, Activation::Identity)
                    .input_shape(1)
                    .bias(2.0)
                    .weights(vec![vec![1.0, 3.0]]),
            )
            .unwrap();
        // 1*1 + 3*bias(2.0) = 7
        assert_eq!(model.single_predict(&[1.0]).unwrap(), vec![7.0]);
    }
}
