//! inversion — the smooth TEM inversion driver and its results.
//!
//! Purpose
//! -------
//! Public entry point of the crate. Prepare forward operators from a depth
//! grid and a start model, configure the regularized inversion, run it
//! against a measured sounding, and explore the regularization weight.
//!
//! Key behaviors
//! -------------
//! - [`driver`]: [`TemSmoothInversion`] with `prepare_fwd`, `prepare_fwd_ip`,
//!   `prepare_fwd_block`, `prepare_inv`, `invert` and `lambda_sweep`.
//! - [`data`]: validated measured soundings.
//! - [`outcome`]: per-run results and iteration history.
//! - [`lambda`]: lambda sweeps and L-curve selection.
//! - [`errors`]: [`InversionError`] / [`InvResult`].
//!
//! Conventions
//! -----------
//! - Every call that builds a solver goes through the driver's
//!   [`crate::forward::SolverFactory`]; nothing is cached across runs.

pub mod data;
pub mod driver;
pub mod errors;
pub mod lambda;
pub mod outcome;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::data::Sounding;
pub use self::driver::{
    DEFAULT_MAX_DEPTH, DEFAULT_RHO_BOUNDS, ForwardRequest, InversionConfig, InversionSettings,
    PreparedForward, StartLayout, TemSmoothInversion,
};
pub use self::errors::{InvResult, InversionError};
pub use self::lambda::{LCurve, LCurvePoint, LambdaFailure, LambdaSelection, LambdaSweep, explore};
pub use self::outcome::InversionOutcome;
