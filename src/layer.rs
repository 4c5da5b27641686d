//! A single fully connected layer and its assembly-time description.

use itertools::zip_eq;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::activator::Activation;
use crate::error::Error;
use crate::neuron::Neuron;

/// Describes a layer before it is wired into a model.
///
/// Arguments:
///
///  * `neurons` - the layer's output width.
///  * `activation` - the activation used by every neuron in the layer.
///
/// Optional builder settings:
///
///  * [`bias`](LayerSpec::bias) - the constant bias input appended to the
///    layer's inputs (defaults to `1.0`).
///  * [`input_shape`](LayerSpec::input_shape) - the incoming width;
///    mandatory for the first layer, wired from the previous layer
///    otherwise.
///  * [`weights`](LayerSpec::weights) - explicit initial weights, one row
///    per neuron, each row `input_shape + 1` long (bias weight last).
///    Layers without explicit weights draw from a standard normal.
#[derive(Clone, Debug)]
pub struct LayerSpec {
    neurons: usize,
    activation: Activation,
    bias: f64,
    input_shape: Option<usize>,
    weights: Option<Vec<Vec<f64>>>,
}

impl LayerSpec {
    pub fn new(neurons: usize, activation: Activation) -> Self {
        LayerSpec {
            neurons,
            activation,
            bias: 1.0,
            input_shape: None,
            weights: None,
        }
    }

    /// Sets the constant bias input value.
    pub fn bias(mut self, bias: f64) -> Self {
        self.bias = bias;
        self
    }

    /// Declares the incoming width. Required for the first layer only.
    pub fn input_shape(mut self, input_shape: usize) -> Self {
        self.input_shape = Some(input_shape);
        self
    }

    /// Provides explicit initial weights instead of random draws.
    pub fn weights(mut self, weights: Vec<Vec<f64>>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Builds the layer. `wired_shape` is the previous layer's output
    /// width; a declared `input_shape` must agree with it when both are
    /// present.
    pub(crate) fn assemble<R: Rng>(
        self,
        wired_shape: Option<usize>,
        rng: &mut R,
    ) -> Result<Layer, Error> {
        if self.neurons == 0 {
            return Err(Error::EmptyLayer);
        }
        let input_shape = match (wired_shape, self.input_shape) {
            (Some(wired), Some(declared)) if wired != declared => {
                return Err(Error::shape("layer input shape", wired, declared));
            }
            (Some(wired), _) => wired,
            (None, Some(declared)) => declared,
            (None, None) => return Err(Error::MissingInputShape),
        };
        let width = input_shape + 1;
        let neurons = match self.weights {
            Some(rows) => {
                if rows.len() != self.neurons {
                    return Err(Error::shape("explicit weight rows", self.neurons, rows.len()));
                }
                let mut neurons = Vec::with_capacity(rows.len());
                for row in rows {
                    if row.len() != width {
                        return Err(Error::shape("explicit weight row", width, row.len()));
                    }
                    neurons.push(Neuron::new(row));
                }
                neurons
            }
            None => (0..self.neurons)
                .map(|_| {
                    let weights = (0..width).map(|_| rng.sample::<f64, _>(StandardNormal)).collect();
                    Neuron::new(weights)
                })
                .collect(),
        };
        Ok(Layer {
            neurons,
            activation: self.activation,
            bias: self.bias,
            input_shape,
            role: Role::Output,
            phase: Phase::Idle,
        })
    }
}

/// Position of a layer in the backward traversal, assigned by the model
/// when layers are appended.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) enum Role {
    Hidden,
    Output,
}

/// Per-training-step lifecycle tag. The backward pass consumes values
/// cached by the forward pass, so the transitions are checked: running
/// the phases out of order would silently read stale scratch state.
#[derive(Copy, Clone, Debug, PartialEq)]
enum Phase {
    Idle,
    ForwardDone,
    BackwardDone,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Idle
    }
}

/// An ordered, fixed-width collection of neurons sharing one activation
/// kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Layer {
    neurons: Vec<Neuron>,
    activation: Activation,
    bias: f64,
    input_shape: usize,
    role: Role,
    #[serde(skip)]
    phase: Phase,
}

impl Layer {
    /// The layer's output width.
    pub fn output_shape(&self) -> usize {
        self.neurons.len()
    }

    /// The incoming width, bias input excluded.
    pub fn input_shape(&self) -> usize {
        self.input_shape
    }

    /// The constant bias input appended to this layer's inputs.
    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// The activation shared by every neuron in the layer.
    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    /// The outputs cached by the last forward pass, in neuron order.
    pub fn values(&self) -> Vec<f64> {
        self.neurons.iter().map(|n| n.value()).collect()
    }

    /// Weight rows, one per neuron, bias weight last.
    pub fn weights(&self) -> Vec<Vec<f64>> {
        self.neurons.iter().map(|n| n.weights().to_vec()).collect()
    }

    pub(crate) fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    /// Feeds the bias-extended `inputs` through every neuron, returning
    /// the layer's output vector. Normalizing activations rescale the
    /// outputs across the layer; every other kind keeps the per-neuron
    /// results untouched. `index` tags numeric failures with the layer.
    pub(crate) fn forward(&mut self, inputs: &[f64], index: usize) -> Result<Vec<f64>, Error> {
        assert_eq!(inputs.len(), self.input_shape + 1);
        let activation = self.activation;
        let out = if activation.is_normalizing() {
            self.forward_normalized(inputs, index)?
        } else {
            self.neurons
                .iter_mut()
                .map(|neuron| neuron.forward(inputs, activation))
                .collect()
        };
        if out.iter().any(|y| !y.is_finite()) {
            return Err(Error::NonFiniteOutput { layer: index });
        }
        self.phase = Phase::ForwardDone;
        Ok(out)
    }

    /// Numerically stable normalization: shifts the weighted sums by
    /// their maximum before exponentiating, then rescales by the total.
    fn forward_normalized(&mut self, inputs: &[f64], index: usize) -> Result<Vec<f64>, Error> {
        let activation = self.activation;
        let nets: Vec<f64> = self.neurons.iter().map(|n| n.net(inputs)).collect();
        let max = nets.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return Err(Error::NonFiniteOutput { layer: index });
        }
        let mut out = Vec::with_capacity(nets.len());
        let mut sum = 0.0;
        for net in nets {
            let y = activation.f(net - max);
            sum += y;
            out.push(y);
        }
        if !sum.is_finite() || sum <= 0.0 {
            return Err(Error::NonFiniteOutput { layer: index });
        }
        for (neuron, y) in zip_eq(self.neurons.iter_mut(), out.iter_mut()) {
            *y /= sum;
            neuron.set_value(*y);
        }
        Ok(out)
    }

    /// Output-layer backward rule: each neuron's error delta comes from
    /// the activation's output-delta function against the expected
    /// target, and the gradient terms accumulate against the previous
    /// layer's bias-extended values.
    pub(crate) fn backward_output(&mut self, expected: &[f64], prev_values: &[f64], rate: f64) {
        assert_eq!(self.role, Role::Output);
        assert_eq!(
            self.phase,
            Phase::ForwardDone,
            "backward pass before forward pass"
        );
        assert_eq!(expected.len(), self.neurons.len());
        let activation = self.activation;
        for (neuron, &target) in zip_eq(self.neurons.iter_mut(), expected) {
            let delta_err = activation.output_delta(target, neuron.value());
            neuron.record_backward(delta_err, prev_values, rate);
        }
        self.phase = Phase::BackwardDone;
    }

    /// Hidden-layer backward rule: each neuron's error is the sum of the
    /// downstream errors weighted by the connecting weights, scaled by
    /// the local activation derivative. The downstream layer must have
    /// run its own backward pass already.
    pub(crate) fn backward_hidden(
        &mut self,
        next_neurons: &[Neuron],
        prev_values: &[f64],
        rate: f64,
    ) {
        assert_eq!(self.role, Role::Hidden);
        assert_eq!(
            self.phase,
            Phase::ForwardDone,
            "backward pass before forward pass"
        );
        let activation = self.activation;
        for (j, neuron) in self.neurons.iter_mut().enumerate() {
            let downstream: f64 = next_neurons
                .iter()
                .map(|next| next.delta_err() * next.weight(j))
                .sum();
            let delta_err = activation.hidden_coef(neuron.value()) * downstream;
            neuron.record_backward(delta_err, prev_values, rate);
        }
        self.phase = Phase::BackwardDone;
    }

    /// Zeroes every neuron's per-sample scratch state.
    pub(crate) fn reset_scratch(&mut self) {
        for neuron in &mut self.neurons {
            neuron.reset_scratch();
        }
        self.phase = Phase::Idle;
    }

    /// Applies every neuron's averaged pending gradients.
    pub(crate) fn update_weights(&mut self, batch_size: usize) {
        for neuron in &mut self.neurons {
            neuron.update_weights(batch_size);
        }
    }
}
