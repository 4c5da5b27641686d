//! The atomic computational unit of the network.

use serde::{Deserialize, Serialize};

use crate::activator::Activation;

/// A single neuron: one weight per input plus a trailing bias weight, and
/// the scratch state the training loop cycles through.
///
/// A neuron is owned exclusively by its layer; the layer drives the
/// backward delta rule and writes the results in via
/// [`record_backward`](Neuron::record_backward).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Neuron {
    /// Connection weights; the last entry weighs the layer's bias input.
    weights: Vec<f64>,
    /// Output of the last forward pass. Overwritten every pass.
    value: f64,
    /// Error signal from the last backward pass. Reset between samples.
    delta_err: f64,
    /// Pending weight adjustments, summed across a mini-batch.
    gradients: Accumulator,
}

impl Neuron {
    /// Creates a neuron with the provided `weights` (bias weight last).
    pub(crate) fn new(weights: Vec<f64>) -> Self {
        let gradients = Accumulator::new(weights.len());
        Neuron {
            weights,
            value: 0.0,
            delta_err: 0.0,
            gradients,
        }
    }

    /// The weight vector, bias weight last.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Output cached by the last forward pass.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Error signal computed by the last backward pass.
    pub fn delta_err(&self) -> f64 {
        self.delta_err
    }

    pub(crate) fn weight(&self, k: usize) -> f64 {
        self.weights[k]
    }

    /// Computes the weighted input sum, bias input included.
    pub(crate) fn net(&self, inputs: &[f64]) -> f64 {
        assert_eq!(inputs.len(), self.weights.len());
        self.weights.iter().zip(inputs).map(|(w, x)| w * x).sum()
    }

    /// Feeds `inputs` forward through this neuron, caching and returning
    /// the activated output.
    pub(crate) fn forward(&mut self, inputs: &[f64], activation: Activation) -> f64 {
        self.value = activation.f(self.net(inputs));
        self.value
    }

    /// Normalizing layers compute their outputs across the whole layer;
    /// this stores one back into the neuron's cache.
    pub(crate) fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    /// Records the backward error signal and accumulates the gradient
    /// term `-rate * delta_err * prev_values[k]` for every weight.
    pub(crate) fn record_backward(&mut self, delta_err: f64, prev_values: &[f64], rate: f64) {
        assert_eq!(prev_values.len(), self.weights.len());
        self.delta_err = delta_err;
        self.gradients.accumulate(delta_err, prev_values, rate);
    }

    /// Zeroes the per-sample scratch state (`value` and `delta_err`).
    /// Pending gradients survive until the batch is applied.
    pub(crate) fn reset_scratch(&mut self) {
        self.value = 0.0;
        self.delta_err = 0.0;
    }

    /// Applies the averaged pending gradients and clears the accumulator.
    pub(crate) fn update_weights(&mut self, batch_size: usize) {
        self.gradients.flush_and_apply(&mut self.weights, batch_size);
    }
}

/// Two-phase gradient accumulator: gradient terms are summed across a
/// mini-batch, then applied (averaged) and cleared in a single step, so a
/// reset can never be forgotten between batches.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Accumulator {
    pending: Vec<f64>,
}

impl Accumulator {
    fn new(len: usize) -> Self {
        Accumulator {
            pending: vec![0.0; len],
        }
    }

    /// Adds one sample's gradient contribution for every weight.
    fn accumulate(&mut self, delta_err: f64, prev_values: &[f64], rate: f64) {
        for (pending, &x) in self.pending.iter_mut().zip(prev_values) {
            *pending += -rate * delta_err * x;
        }
    }

    /// Applies the accumulated terms to `weights`, dividing by
    /// `batch_size` to average over the mini-batch, then zeroes the
    /// buffer so the next batch starts clean.
    fn flush_and_apply(&mut self, weights: &mut [f64], batch_size: usize) {
        assert!(batch_size > 0);
        assert_eq!(weights.len(), self.pending.len());
        for (weight, pending) in weights.iter_mut().zip(self.pending.iter_mut()) {
            *weight += *pending / batch_size as f64;
            *pending = 0.0;
        }
    }
}
