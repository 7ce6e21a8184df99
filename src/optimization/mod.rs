//! optimization — objective, transforms, regularization and solvers.
//!
//! Purpose
//! -------
//! Provide the numerical half of the inversion: mapping physical models
//! into an unbounded search space, constraining them, and minimizing the
//! regularized misfit `Φ = Φ_d + λ Φ_m` behind a single error surface.
//!
//! Key behaviors
//! -------------
//! - [`transforms`]: log and bounded-log maps, combined per parameter block
//!   into a [`transforms::CumulativeTransform`].
//! - [`regularization`]: smoothness and damping operators `C`.
//! - [`engine`]: the regularized objective plus Gauss–Newton and argmin
//!   L-BFGS solvers.
//! - [`errors`]: [`OptError`] / [`OptResult`], with configuration and
//!   forward failures carried through unchanged.
//!
//! Conventions
//! -----------
//! - Solvers operate on transformed models only; conversion back to
//!   physical units happens in the inversion layer.
//! - Progress is reported through the `log` facade; nothing here prints.

pub mod engine;
pub mod errors;
pub mod regularization;
pub mod transforms;

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use tem_inversion::optimization::prelude::*;
//
// to import the main optimization surface in a single line.

pub mod prelude {
    pub use super::engine::{
        EngineOptions, LineSearcher, OptimOutcome, RegularizedObjective, SolverKind, Tolerances,
        minimize,
    };
    pub use super::errors::{OptError, OptResult};
    pub use super::regularization::{Regularization, RegularizationKind};
    pub use super::transforms::{CumulativeTransform, ParameterTransforms, Transform};
}
