//! A minimal [feed-forward neural network]
//! (https://en.wikipedia.org/wiki/Feedforward_neural_network) engine:
//! layered neurons, forward inference, and mini-batch gradient descent
//! with back-propagated error deltas.
//!
//! # Example
//!
//! Let's train a simple neural network to compute the XOR function:
//!
//! ```
//! use backprop::{Activation, LayerSpec, Logging, Model};
//!
//! // Create examples of the XOR function
//! let inputs = vec![vec![0.0, 0.0], vec![0.0, 1.0],
//!                   vec![1.0, 0.0], vec![1.0, 1.0]];
//! let expected = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];
//!
//! // Assemble a 2-2-1 sigmoid network and train it on those examples
//! let mut model = Model::new()
//!     .learning_rate(0.5)
//!     .batch_size(4)
//!     .max_iterations(2000)
//!     .error_threshold(0.05)
//!     .logging(Logging::Silent)
//!     .seed(17);
//! model.add(LayerSpec::new(2, Activation::Sigmoid).input_shape(2)).unwrap();
//! model.add(LayerSpec::new(1, Activation::Sigmoid)).unwrap();
//! let outcome = model.fit(&inputs, &expected).unwrap();
//! println!("training ended: {:?}", outcome);
//!
//! // And run inference with the trained weights
//! let outputs = model.predict(&inputs).unwrap();
//! assert_eq!(outputs.len(), 4);
//! ```

pub mod activator;
pub mod error;
pub mod layer;
pub mod model;
pub mod neuron;

pub use crate::activator::Activation;
pub use crate::error::Error;
pub use crate::layer::{Layer, LayerSpec};
pub use crate::model::{Logging, Model, StopReason};
