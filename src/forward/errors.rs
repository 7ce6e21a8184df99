//! Forward-evaluation errors.
//!
//! [`ForwardError`] covers everything that can go wrong between handing a
//! model vector to a forward operator and receiving a simulated response:
//! a model that violates the operator's layout contract (a wrapped,
//! still-fatal [`ConfigError`]), a solver that rejects or fails on its input,
//! and a solver that returns a response of the wrong length.
//!
//! Numerical content of a response (NaN, ±inf) is **not** an error at this
//! layer; it is passed through unchanged for the optimizer to judge.
use crate::model::errors::ConfigError;
use thiserror::Error;

/// Result alias for forward evaluations.
pub type ForwardResult<T> = Result<T, ForwardError>;

/// Forward-evaluation error taxonomy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForwardError {
    /// The model or layer matrix violates the operator contract.
    #[error("Forward configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The external solver could not be constructed for a configuration.
    #[error("Forward solver construction failed: {message}")]
    SolverSetup { message: String },

    /// The external solver rejected or failed on a model.
    #[error("Forward solver failed: {message}")]
    Solver { message: String },

    /// The solver returned a response with the wrong number of samples.
    #[error("Forward response length mismatch: expected {expected}, found {found}")]
    ResponseLengthMismatch { expected: usize, found: usize },

    /// An optimizer-proposed model has a non-finite or non-positive layer
    /// thickness. Unlike a configuration fault this concerns one run only.
    #[error("Proposed model has invalid layer thickness at index {index}: {value}")]
    NonPhysicalThickness { index: usize, value: f64 },

    /// The layer matrix handed to the solver has the wrong shape.
    #[error("Layer matrix shape mismatch: expected {expected:?}, found {found:?}")]
    LayerMatrixShape { expected: (usize, usize), found: (usize, usize) },
}

impl ForwardError {
    /// Convenience constructor for solver implementations.
    pub fn solver(message: impl Into<String>) -> Self {
        ForwardError::Solver { message: message.into() }
    }

    /// Classify a layout error raised on an optimizer-proposed model.
    ///
    /// Invalid thicknesses become [`ForwardError::NonPhysicalThickness`];
    /// anything else stays a configuration fault.
    pub fn from_proposed(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidLayerThickness { index, value } => {
                ForwardError::NonPhysicalThickness { index, value }
            }
            other => ForwardError::Configuration(other),
        }
    }
}
