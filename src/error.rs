//! Error types for model assembly, inference and training.

use thiserror::Error;

/// Errors surfaced by model assembly, inference and training.
///
/// Configuration problems are detected eagerly, at assembly time or at the
/// start of `fit`/`predict`; a run never fails mid-epoch on a bad shape.
/// The `NonFinite*` variants are the one runtime failure: a NaN or infinity
/// produced by the numeric core, fatal to the run that produced it.
#[derive(Debug, Error)]
pub enum Error {
    /// The activation registry has no entry under this name.
    #[error("unknown activation `{0}`")]
    UnknownActivation(String),

    /// The first layer of a model must declare its input shape.
    #[error("first layer requires an explicit input shape")]
    MissingInputShape,

    /// A layer must contain at least one neuron.
    #[error("layer must contain at least one neuron")]
    EmptyLayer,

    /// Two widths or cardinalities that must agree do not.
    #[error("{context}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// `fit` or `predict` called on a model with no layers.
    #[error("model has no layers")]
    EmptyModel,

    /// `fit` called with no training samples.
    #[error("training set is empty")]
    EmptyTrainingSet,

    /// Gradient averaging divides by the batch size, so zero is rejected.
    #[error("batch size must be positive")]
    InvalidBatchSize,

    /// A forward pass produced NaN or an infinity, or a normalizing
    /// layer's rescaling sum was unusable.
    #[error("non-finite value produced in layer {layer}")]
    NonFiniteOutput { layer: usize },

    /// The total training error overflowed to a non-finite value.
    #[error("total training error became non-finite")]
    NonFiniteError,
}

impl Error {
    pub(crate) fn shape(context: &'static str, expected: usize, actual: usize) -> Self {
        Error::ShapeMismatch {
            context,
            expected,
            actual,
        }
    }
}
