//! model — layered-earth parameterization.
//!
//! Purpose
//! -------
//! Own everything that describes *what* is being estimated: the fixed depth
//! discretization, the flat model-vector layouts, the start model, and the
//! configuration-error taxonomy shared by the rest of the crate.
//!
//! Key behaviors
//! -------------
//! - [`depth::DepthGrid`]: validated layer tops plus the survey presets
//!   (constant thickness, thickness breakpoints) and IP-mode replication.
//! - [`layout`]: reshape/flatten rules for the smooth (parameter-major) and
//!   block (thickness-prefixed) model vectors.
//! - [`start::StartModel`]: caller-supplied `[n_layers, n_params]` seed.
//! - [`errors::ConfigError`]: fatal configuration errors.
//!
//! Invariants & assumptions
//! ------------------------
//! - `len(model) == n_layers * n_params` (smooth) or
//!   `(n_layers - 1) + n_layers * n_params` (block); violations are fatal.
//! - Supported parameter counts are 1 (resistivity) and 4 (resistivity,
//!   chargeability, time constant, frequency exponent).
//!
//! Conventions
//! -----------
//! - Depths in metres, resistivities in Ω·m, time constants in seconds.
//! - This module performs no I/O and no logging.

pub mod depth;
pub mod errors;
pub mod layout;
pub mod start;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::depth::DepthGrid;
pub use self::errors::{ConfigError, ConfigResult};
pub use self::layout::{
    IP_PARAMS, ParamKind, Parameterization, RESISTIVITY_PARAMS, flatten_block, flatten_grouped,
    reshape_block, reshape_grouped, tops_from_thicknesses,
};
pub use self::start::StartModel;
