//! Activation function types.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// [Activation function](https://en.wikipedia.org/wiki/Activation_function)
/// types.
///
/// Each kind carries the three functions the engine needs: the forward
/// activation [`f`](Activation::f), the output-layer error delta
/// [`output_delta`](Activation::output_delta), and the hidden-layer
/// derivative coefficient [`hidden_coef`](Activation::hidden_coef).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    /// Rectified Linear Unit
    Relu,
    /// Leaky Rectified Linear Unit
    ///
    /// Takes an `alpha` value to use for negative inputs.
    LeakyRelu(f64),
    /// Sigmoid function
    Sigmoid,
    /// Hyperbolic tan function
    Tanh,
    /// Identity (linear) activation
    Identity,
    /// Normalizing activation: the owning layer rescales its outputs so
    /// they sum to one.
    Softmax,
}

impl Activation {
    /// Resolves an activation by registry name.
    ///
    /// `leaky_relu` resolves with its conventional `alpha` of `0.01`;
    /// construct the variant directly for a different slope.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        match name {
            "relu" => Ok(Activation::Relu),
            "leaky_relu" => Ok(Activation::LeakyRelu(0.01)),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "identity" => Ok(Activation::Identity),
            "softmax" => Ok(Activation::Softmax),
            _ => Err(Error::UnknownActivation(name.to_string())),
        }
    }

    /// Evaluates `f(x)` for the selected activation function.
    ///
    /// For `Softmax` this is the raw exponential; the owning layer shifts
    /// the inputs and rescales the results (see `Layer::forward`).
    pub fn f(&self, x: f64) -> f64 {
        match *self {
            Activation::Relu => {
                if x > 0.0 {
                    x
                } else {
                    0.0
                }
            }
            Activation::LeakyRelu(alpha) => {
                if x > 0.0 {
                    x
                } else {
                    alpha * x
                }
            }
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => 2.0 / (1.0 + (-2.0 * x).exp()) - 1.0,
            Activation::Identity => x,
            Activation::Softmax => x.exp(),
        }
    }

    /// Error delta for an output-layer neuron under squared error.
    ///
    /// Takes the *output* of the activation function rather than its
    /// input, so no pre-activation values need to be stored.
    pub fn output_delta(&self, expected: f64, actual: f64) -> f64 {
        match *self {
            // Softmax pairs with cross-entropy, which cancels the
            // Jacobian down to the raw difference.
            Activation::Softmax => actual - expected,
            _ => (actual - expected) * self.hidden_coef(actual),
        }
    }

    /// Evaluates the derivative `f'(x)`, where `x = f^{-1}(y)`.
    ///
    /// Note that this function takes in the *output* of the activation
    /// function, rather than the input. This is an optimization that means
    /// we don't have to store the intermediate results before activation.
    /// For `Softmax` this is the diagonal term of the Jacobian.
    pub fn hidden_coef(&self, y: f64) -> f64 {
        match *self {
            Activation::Relu => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::LeakyRelu(alpha) => {
                if y > 0.0 {
                    1.0
                } else {
                    alpha
                }
            }
            Activation::Sigmoid => y * (1.0 - y),
            Activation::Tanh => 1.0 - y * y,
            Activation::Identity => 1.0,
            Activation::Softmax => y * (1.0 - y),
        }
    }

    /// True for kinds whose layer outputs are rescaled to sum to one.
    pub fn is_normalizing(&self) -> bool {
        matches!(*self, Activation::Softmax)
    }
}

impl FromStr for Activation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Activation::from_name(s)
    }
}
