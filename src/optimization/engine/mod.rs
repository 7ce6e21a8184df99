//! engine — regularized least-squares minimization for smooth inversion.
//!
//! Purpose
//! -------
//! Minimize the inversion objective `Φ(θ) = Φ_d + λ Φ_m` in transformed
//! model space. Callers build a [`RegularizedObjective`] over a forward
//! operator and call [`minimize`] with an [`EngineOptions`].
//!
//! Key behaviors
//! -------------
//! - [`gauss_newton`]: the default solver; normal equations with a
//!   backtracking line search and chi-square / cost-change stopping rules.
//! - [`adapter`], [`builders`], [`run`]: the argmin L-BFGS path, kept for
//!   objectives without a least-squares structure.
//! - [`finite_diff`]: parallel forward-difference Jacobians and
//!   error-capturing FD gradients.
//! - [`objective`]: data weighting, transforms, regularization and the
//!   misfit summaries (`Φ_d`, `Φ_m`, `χ²`, relative RMS).
//!
//! Invariants & assumptions
//! ------------------------
//! - `Φ` is minimized directly; no sign conventions are involved.
//! - Configuration types are validated on construction.
//! - Forward failures abort a run and surface as `OptError::Forward`.
//!
//! Testing notes
//! -------------
//! - Unit tests live next to each submodule; end-to-end inversion runs are
//!   exercised by the integration tests under `tests/`.

pub mod adapter;
pub mod api;
pub mod builders;
pub mod finite_diff;
pub mod gauss_newton;
pub mod objective;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::{minimize, minimize_lbfgs};
pub use self::objective::{RegularizedObjective, relative_rms};
pub use self::traits::{
    EngineOptions, IterationRecord, LeastSquaresProblem, LineSearcher, Misfit, Objective,
    OptimOutcome, SolverKind, Tolerances,
};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Jacobian, Theta};
