//! Top-level inversion errors.
//!
//! [`InversionError`] is what every driver entry point returns. It has one
//! variant per failure class:
//!
//! - `Configuration`: invalid inputs (fatal, reported before any solver
//!   work where possible).
//! - `Forward`: the forward solver failed or produced a malformed response.
//! - `Optimization`: the engine failed (singular system, argmin backend).
//!
//! Configuration faults detected deep inside a forward or engine call are
//! re-surfaced as `Configuration`, so callers can match on the class without
//! unwrapping nested enums. Non-convergence is *not* an error; it is reported
//! through `InversionOutcome::converged`.
use crate::forward::errors::ForwardError;
use crate::model::errors::ConfigError;
use crate::optimization::errors::OptError;
#[cfg(feature = "python-bindings")]
use pyo3::{
    PyErr,
    exceptions::{PyRuntimeError, PyValueError},
};
use thiserror::Error;

/// Result alias for driver operations.
pub type InvResult<T> = Result<T, InversionError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InversionError {
    #[error("Configuration error: {0}")]
    Configuration(ConfigError),

    #[error("Forward evaluation failed: {0}")]
    Forward(ForwardError),

    #[error("Optimization failed: {0}")]
    Optimization(OptError),
}

impl InversionError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, InversionError::Configuration(_))
    }
}

impl From<ConfigError> for InversionError {
    fn from(err: ConfigError) -> Self {
        InversionError::Configuration(err)
    }
}

impl From<ForwardError> for InversionError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::Configuration(inner) => InversionError::Configuration(inner),
            other => InversionError::Forward(other),
        }
    }
}

impl From<OptError> for InversionError {
    fn from(err: OptError) -> Self {
        match err {
            OptError::Configuration(inner) => InversionError::Configuration(inner),
            OptError::Forward(inner) => inner.into(),
            other => InversionError::Optimization(other),
        }
    }
}

/// Configuration faults become `ValueError`, everything else `RuntimeError`.
#[cfg(feature = "python-bindings")]
impl std::convert::From<InversionError> for PyErr {
    fn from(err: InversionError) -> PyErr {
        match err {
            InversionError::Configuration(_) => PyValueError::new_err(err.to_string()),
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Nested configuration faults are lifted to the top-level class.
    //
    // Given
    // -----
    // - A `ConfigError` wrapped in `ForwardError`, in `OptError::Configuration`
    //   and in `OptError::Forward(ForwardError::Configuration)`.
    //
    // Expect
    // ------
    // - All three convert to `InversionError::Configuration` with the same payload.
    fn nested_configuration_faults_are_resurfaced() {
        let cfg = ConfigError::DataLengthMismatch { expected: 3, found: 2 };

        let via_forward: InversionError = ForwardError::Configuration(cfg.clone()).into();
        let via_opt: InversionError = OptError::Configuration(cfg.clone()).into();
        let via_both: InversionError =
            OptError::Forward(ForwardError::Configuration(cfg.clone())).into();

        for err in [via_forward, via_opt, via_both] {
            assert_eq!(err, InversionError::Configuration(cfg.clone()));
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn solver_failures_keep_their_class() {
        let fwd = ForwardError::solver("diverged");

        let direct: InversionError = fwd.clone().into();
        let through_engine: InversionError = OptError::Forward(fwd.clone()).into();
        let engine: InversionError = OptError::SingularSystem { dim: 4 }.into();

        assert_eq!(direct, InversionError::Forward(fwd.clone()));
        assert_eq!(through_engine, InversionError::Forward(fwd));
        assert_eq!(engine, InversionError::Optimization(OptError::SingularSystem { dim: 4 }));
    }
}
