//! Optimization-engine errors.
//!
//! [`OptError`] is the error type of every engine path: option validation,
//! objective evaluation, finite-difference derivatives, the Gauss–Newton
//! linear solve and the argmin-backed L-BFGS run. Errors raised by forward
//! operators and configuration faults detected while binding an objective
//! are carried unchanged inside [`OptError::Forward`] and
//! [`OptError::Configuration`].
//!
//! Argmin reports failures as an opaque `argmin::core::Error`. The
//! [`From`] conversion first recovers an [`OptError`] that was raised inside
//! a cost or gradient callback (so a solver failure surfaces exactly as the
//! objective reported it), then maps argmin's own error kinds, and only then
//! falls back to a textual backend error.
use crate::forward::errors::ForwardError;
use crate::model::errors::ConfigError;
use argmin::core::{ArgminError, Error};
use thiserror::Error;

/// Result alias for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptError {
    // ---- Gradient ----
    /// Implies that FD should be used
    #[error("Gradient optimization not implemented")]
    GradientNotImplemented,

    /// Gradient dimensions do not match parameter dimensions.
    #[error("Gradient dimension mismatch: expected {expected}, found {found}")]
    GradientDimMismatch { expected: usize, found: usize },

    /// Gradient elements need to be finite
    #[error("Invalid gradient at index {index}: {value}: {reason}")]
    InvalidGradient { index: usize, value: f64, reason: &'static str },

    // ---- Jacobian ----
    /// Jacobian must be `n_data × n_model`.
    #[error("Jacobian dimension mismatch: expected {expected:?}, found {found:?}")]
    JacobianDimMismatch { expected: (usize, usize), found: (usize, usize) },

    /// Jacobian entries need to be finite.
    #[error("Invalid Jacobian at ({row}, {col}): {value}, must be finite")]
    InvalidJacobian { row: usize, col: usize, value: f64 },

    // ---- EngineOptions ----
    /// Cost change tolerance needs to be positive and finite.
    #[error("Invalid cost function change tolerance {tol}: {reason}")]
    InvalidTolCost { tol: f64, reason: &'static str },

    /// Chi-square target needs to be positive and finite.
    #[error("Invalid chi-square target {value}: {reason}")]
    InvalidTargetChi2 { value: f64, reason: &'static str },

    /// Maximum iterations needs to be positive.
    #[error("Invalid maximum iterations {max_iter}: {reason}")]
    InvalidMaxIter { max_iter: usize, reason: &'static str },

    /// At least one stopping rule must be provided.
    #[error("No tolerances provided")]
    NoTolerancesProvided,

    /// Invalid line searcher name.
    #[error("Invalid line searcher '{name}': {reason}")]
    InvalidLineSearch { name: String, reason: &'static str },

    /// lbfgs_mem needs to be at least 1.
    #[error("Invalid L-BFGS memory {mem}: {reason}")]
    InvalidLBFGSMem { mem: usize, reason: &'static str },

    // ---- Objective ----
    /// Objective returned a non-finite value.
    #[error("Non-finite cost value: {value}")]
    NonFiniteCost { value: f64 },

    /// Parameter vector has the wrong length for the objective.
    #[error("Parameter length mismatch: expected {expected}, found {found}")]
    ParameterLengthMismatch { expected: usize, found: usize },

    /// Parameter vector contains NaN/±inf.
    #[error("Invalid parameter at index {index}: {value}, must be finite")]
    InvalidThetaInput { index: usize, value: f64 },

    /// Configuration fault detected while binding an objective.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// Forward evaluation failed.
    #[error(transparent)]
    Forward(#[from] ForwardError),

    // ---- Gauss–Newton ----
    /// Normal equations could not be solved.
    #[error("Gauss-Newton normal equations are singular (dimension {dim})")]
    SingularSystem { dim: usize },

    // ---- Optimizer outcome ----
    /// Estimated parameters must be finite.
    #[error("Invalid estimated parameter at index {index}: {value}: {reason}")]
    InvalidThetaHat { index: usize, value: f64, reason: &'static str },

    /// Theta hat is missing
    #[error("Missing estimated parameters (theta hat)")]
    MissingThetaHat,

    // ---- Argmin ---
    #[error("Invalid parameter: {text}")]
    InvalidParameter { text: String },
    #[error("Not implemented: {text}")]
    NotImplemented { text: String },
    #[error("Not initialized: {text}")]
    NotInitialized { text: String },
    #[error("Condition violated: {text}")]
    ConditionViolated { text: String },
    #[error("Checkpoint not found: {text}")]
    CheckPointNotFound { text: String },
    #[error("Potential bug: {text}")]
    PotentialBug { text: String },
    #[error("Impossible error: {text}")]
    ImpossibleError { text: String },
    /// Any other argmin error, by message.
    #[error("Backend error: {text}")]
    BackendError { text: String },

    // ---- Fallback ----
    #[error("Unknown error")]
    UnknownError,
}

impl OptError {
    /// The configuration fault behind this error, if any.
    pub fn configuration(&self) -> Option<&ConfigError> {
        match self {
            OptError::Configuration(err) | OptError::Forward(ForwardError::Configuration(err)) => {
                Some(err)
            }
            _ => None,
        }
    }
}

impl From<Error> for OptError {
    fn from(original_err: Error) -> Self {
        let original_err = match original_err.downcast::<OptError>() {
            Ok(opt_err) => return opt_err,
            Err(err) => err,
        };
        match original_err.downcast::<ArgminError>() {
            Ok(argmin_err) => match argmin_err {
                ArgminError::InvalidParameter { text } => OptError::InvalidParameter { text },
                ArgminError::NotImplemented { text } => OptError::NotImplemented { text },
                ArgminError::NotInitialized { text } => OptError::NotInitialized { text },
                ArgminError::ConditionViolated { text } => OptError::ConditionViolated { text },
                ArgminError::CheckpointNotFound { text } => OptError::CheckPointNotFound { text },
                ArgminError::PotentialBug { text } => OptError::PotentialBug { text },
                ArgminError::ImpossibleError { text } => OptError::ImpossibleError { text },
                _ => OptError::UnknownError,
            },
            Err(err) => OptError::BackendError { text: err.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // An OptError raised inside an argmin callback must come back unchanged.
    fn argmin_round_trip_recovers_own_errors() {
        let inner = OptError::Forward(ForwardError::solver("diverged"));
        let wrapped: Error = inner.clone().into();

        assert_eq!(OptError::from(wrapped), inner);
    }

    #[test]
    fn argmin_errors_are_mapped_by_kind() {
        let wrapped: Error = ArgminError::NotInitialized { text: "state".into() }.into();
        assert_eq!(OptError::from(wrapped), OptError::NotInitialized { text: "state".into() });

        let other: Error = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert!(matches!(OptError::from(other), OptError::BackendError { .. }));
    }

    #[test]
    fn configuration_faults_are_found_through_forward_errors() {
        let err = OptError::Forward(ForwardError::Configuration(ConfigError::EmptyDepthGrid));
        assert_eq!(err.configuration(), Some(&ConfigError::EmptyDepthGrid));
        assert_eq!(OptError::SingularSystem { dim: 3 }.configuration(), None);
    }
}
