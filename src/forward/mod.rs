//! forward — from model vectors to simulated TEM responses.
//!
//! Purpose
//! -------
//! Wrap an external EM forward solver so the inversion engine can evaluate a
//! flat model vector. The physics stay behind [`solver::ForwardSolver`]; this
//! module only handles configuration, layer-matrix assembly and the
//! model-vector contract.
//!
//! Key behaviors
//! -------------
//! - [`config`]: immutable solver configuration, device setup, IP model type,
//!   response transform and receiver-gate windows.
//! - [`solver`]: the solver and factory traits.
//! - [`adapter`]: depth-column assembly, shape and response-length checks.
//! - [`operator`]: smooth and block forward operators behind
//!   [`operator::ForwardOperator`].
//! - [`errors`]: [`ForwardError`] / [`ForwardResult`].
//!
//! Conventions
//! -----------
//! - Receiver times are seconds; time windows are microseconds.
//! - Responses are never inspected for NaN/inf here.

pub mod adapter;
pub mod config;
pub mod errors;
pub mod operator;
pub mod solver;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::adapter::ForwardAdapter;
pub use self::config::{DeviceSetup, ForwardConfig, IpModel, ResponseTransform, TimeWindow};
pub use self::errors::{ForwardError, ForwardResult};
pub use self::operator::{BlockForward, ForwardModel, ForwardOperator, SmoothForward};
pub use self::solver::{ForwardSolver, SolverFactory};
