//! Configuration errors for the layered-earth parameterization and run setup.
//!
//! Every variant here is **fatal**: it describes a malformed request (depth
//! grid, start model, receiver times, observed data, or run options) that is
//! rejected before any forward evaluation happens. Nothing in the crate tries
//! to repair these inputs; lengths are never truncated or padded and default
//! values are never substituted.
//!
//! ## Conventions
//! - **Indices are 0-based** and refer to the offending element of the input
//!   vector as supplied by the caller.
//! - Depths are metres below surface, receiver times are seconds, time
//!   windows are microseconds.
use thiserror::Error;

/// Result alias for configuration and validation paths.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration error taxonomy.
///
/// Raised immediately and never retried. Converted into
/// `InversionError::Configuration` at the driver boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    // ---- Depth grid ----
    /// The depth grid has no layers.
    #[error("Depth grid is empty; at least one layer is required.")]
    EmptyDepthGrid,

    /// A depth is NaN/±inf.
    #[error("Depth at index {index} is non-finite: {value}")]
    NonFiniteDepth { index: usize, value: f64 },

    /// A depth lies above the surface.
    #[error("Depth at index {index} is negative: {value}")]
    NegativeDepth { index: usize, value: f64 },

    /// Layer tops must be strictly increasing.
    #[error("Depth at index {index} ({value}) does not exceed the previous depth ({previous})")]
    NonIncreasingDepth { index: usize, previous: f64, value: f64 },

    /// Layer thicknesses must be finite and > 0.
    #[error("Invalid layer thickness at index {index}: {value}, must be finite and > 0")]
    InvalidLayerThickness { index: usize, value: f64 },

    /// Maximum depth must be finite and > 0.
    #[error("Invalid maximum depth {value}: must be finite and > 0")]
    InvalidMaxDepth { value: f64 },

    /// Breakpoint presets for variable layer thickness are malformed.
    #[error("Invalid depth breakpoints: {reason}")]
    InvalidBreakpoints { reason: &'static str },

    // ---- Model vector / start model ----
    /// Depth grid and start model describe a different number of layers.
    #[error("Depth vector and start model have different lengths: {depths} depths, {model} layers")]
    DepthModelLengthMismatch { depths: usize, model: usize },

    /// A flat model vector does not match `n_layers * n_params` (plus thicknesses in block mode).
    #[error("Model vector length mismatch: expected {expected}, found {found}")]
    ModelLengthMismatch { expected: usize, found: usize },

    /// Parameter count must be 1 (resistivity) or 4 (complex resistivity).
    #[error("Unsupported number of parameters per layer: {found} (supported: 1 or 4)")]
    UnsupportedParameterCount { found: usize },

    /// Parameter count inferred from the start model does not match the requested mode.
    #[error("Parameter count mismatch: expected {expected} parameters per layer, found {found}")]
    ParameterCountMismatch { expected: usize, found: usize },

    /// IP model type is incompatible with the number of parameters per layer.
    #[error("IP model '{ip_model}' is incompatible with {n_params} parameter(s) per layer")]
    IpModelMismatch { ip_model: String, n_params: usize },

    /// A start-model entry is NaN/±inf.
    #[error("Start model entry at index {index} is non-finite: {value}")]
    NonFiniteModel { index: usize, value: f64 },

    // ---- Receiver times / observed data ----
    /// No receiver times are available (possibly after windowing).
    #[error("No receiver times available")]
    EmptyReceiverTimes,

    /// Receiver times must be finite, > 0 and strictly increasing.
    #[error("Invalid receiver time at index {index}: {value}: {reason}")]
    InvalidReceiverTimes { index: usize, value: f64, reason: &'static str },

    /// Time window must satisfy `0 <= t_min < t_max`, both finite.
    #[error("Invalid time window ({t_min}, {t_max}) µs: requires finite 0 <= t_min < t_max")]
    InvalidTimeWindow { t_min: f64, t_max: f64 },

    /// Time window removed every receiver gate.
    #[error("Time window ({t_min}, {t_max}) µs does not contain any receiver time")]
    EmptyTimeWindow { t_min: f64, t_max: f64 },

    /// Observed data length does not match the forward operator.
    #[error("Data length mismatch: expected {expected}, found {found}")]
    DataLengthMismatch { expected: usize, found: usize },

    /// Observed data must be finite and > 0 for the log data transform.
    #[error("Invalid observation at index {index}: {value}: {reason}")]
    InvalidObservation { index: usize, value: f64, reason: &'static str },

    /// Relative errors must be finite and > 0.
    #[error("Invalid relative error at index {index}: {value}, must be finite and > 0")]
    InvalidRelativeError { index: usize, value: f64 },

    // ---- Regularization / transforms ----
    /// Regularization weight must be finite and > 0.
    #[error("Invalid regularization weight (lambda) {value}: must be finite and > 0")]
    InvalidLambda { value: f64 },

    /// Iteration cap must be positive.
    #[error("Invalid maximum iterations {value}: must be > 0")]
    InvalidMaxIter { value: usize },

    /// Lambda sweep range is malformed.
    #[error("Invalid lambda sweep: {reason}")]
    InvalidLambdaSweep { reason: &'static str },

    /// Bounded transforms need finite `lower < upper`.
    #[error("Invalid transform bounds [{lower}, {upper}]: requires finite lower < upper")]
    InvalidTransformBounds { lower: f64, upper: f64 },

    /// Log transforms need a finite floor > 0.
    #[error("Invalid log-transform floor {value}: must be finite and > 0")]
    InvalidLogFloor { value: f64 },
}
