//! Public API surface of the inversion engine.
//!
//! - [`Objective`]: scalar objective minimized by L-BFGS.
//! - [`LeastSquaresProblem`]: the richer interface Gauss–Newton needs
//!   (weighted residuals, Jacobian, constraint operator, lambda).
//! - [`Misfit`]: one evaluation of the regularized objective.
//! - [`EngineOptions`], [`Tolerances`], [`SolverKind`], [`LineSearcher`]:
//!   run configuration.
//! - [`OptimOutcome`], [`IterationRecord`]: normalized results.
//!
//! Convention: the engine *minimizes* `Φ(θ) = Φ_d + λ Φ_m` directly, with
//! `θ` in transformed model space. Gradients returned by
//! [`Objective::grad`] are gradients of `Φ`.
use crate::optimization::{
    engine::{
        types::{Cost, FnEvalMap, Grad, Jacobian, Theta},
        validation::{validate_theta_hat, validate_value, verify_target_chi2, verify_tol_cost},
    },
    errors::{OptError, OptResult},
};
use argmin::core::{TerminationReason, TerminationStatus};
use argmin_math::ArgminL2Norm;
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default relative objective change `|ΔΦ| / Φ` below which a run stops
/// (1 %). L-BFGS runs scale it by `Φ(θ₀)` into argmin's absolute tolerance.
pub const DEFAULT_TOL_COST: f64 = 0.01;

/// Default chi-square stopping target.
pub const DEFAULT_TARGET_CHI2: f64 = 1.0;

/// Default iteration cap.
pub const DEFAULT_MAX_ITER: usize = 20;

/// Scalar objective interface.
///
/// Required:
/// - `value(&Theta) -> OptResult<Cost>`: evaluate `Φ(θ)`.
/// - `check(&Theta) -> OptResult<()>`: reject obviously invalid `θ`. Called
///   once before optimization.
///
/// Optional:
/// - `grad(&Theta) -> OptResult<Grad>`: analytic gradient `∇Φ(θ)`. If not
///   implemented, finite differences are used automatically.
pub trait Objective {
    // Required methods
    fn value(&self, theta: &Theta) -> OptResult<Cost>;
    fn check(&self, theta: &Theta) -> OptResult<()>;

    // Optional methods
    fn grad(&self, _theta: &Theta) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }
}

/// One evaluation of the regularized objective at a model.
#[derive(Debug, Clone, PartialEq)]
pub struct Misfit {
    /// Simulated response in data space.
    pub response: Array1<f64>,
    /// Weighted transformed data residual `w ∘ (T_d(d) - T_d(f))`.
    pub residual: Array1<f64>,
    /// Constraint residual (`C y` or `C (y - y_ref)`).
    pub roughness: Array1<f64>,
    pub phi_d: f64,
    pub phi_m: f64,
    pub lambda: f64,
    /// `Φ_d + λ Φ_m`.
    pub phi: f64,
    /// `Φ_d / N`.
    pub chi2: f64,
    /// Relative RMS misfit in data space, percent.
    pub rrms: f64,
}

impl Misfit {
    /// Assemble a misfit record; the scalar summaries are derived here.
    pub fn new(
        response: Array1<f64>, residual: Array1<f64>, roughness: Array1<f64>, lambda: f64, rrms: f64,
    ) -> Self {
        let phi_d = residual.dot(&residual);
        let phi_m = roughness.dot(&roughness);
        let n = residual.len().max(1) as f64;
        Self {
            response,
            residual,
            roughness,
            phi_d,
            phi_m,
            lambda,
            phi: phi_d + lambda * phi_m,
            chi2: phi_d / n,
            rrms,
        }
    }
}

/// Interface required by the Gauss–Newton solver.
///
/// Implementors must be `Sync` so Jacobian columns can be evaluated in
/// parallel when the forward operator allows it.
pub trait LeastSquaresProblem: Objective + Sync {
    /// Number of model parameters.
    fn dim(&self) -> usize;

    /// Evaluate all objective terms at `theta`.
    fn misfit(&self, theta: &Theta) -> OptResult<Misfit>;

    /// Sensitivities of the weighted, transformed response at `theta`.
    ///
    /// `at` is the misfit already evaluated at `theta`.
    fn jacobian(&self, theta: &Theta, at: &Misfit) -> OptResult<Jacobian>;

    /// Constraint operator `C`.
    fn constraint_matrix(&self) -> ArrayView2<'_, f64>;

    /// Regularization weight.
    fn lambda(&self) -> f64;
}

/// Choice of line search used inside the L-BFGS solver.
///
/// Parsing is case-insensitive (`"MoreThuente"`, `"HagerZhang"`); unknown
/// names return `OptError::InvalidLineSearch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// Minimization algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolverKind {
    /// Regularized Gauss–Newton with backtracking line search.
    #[default]
    GaussNewton,
    /// argmin L-BFGS on the scalar objective.
    Lbfgs(LineSearcher),
}

/// Numerical tolerances and iteration limits.
///
/// - `tol_cost`: stop when `|ΔΦ| / Φ` falls below this value.
/// - `target_chi2`: stop once `χ² <= target_chi2` (Gauss–Newton only).
/// - `max_iter`: hard cap on iterations.
///
/// Any field can be `None` but **at least one** must be provided.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    pub tol_cost: Option<f64>,
    pub target_chi2: Option<f64>,
    pub max_iter: Option<usize>,
}

impl Tolerances {
    /// Construct validated tolerances.
    ///
    /// # Errors
    /// - [`OptError::NoTolerancesProvided`] if all three are `None`.
    /// - [`OptError::InvalidTolCost`] / [`OptError::InvalidTargetChi2`] for
    ///   non-finite or non-positive values.
    /// - [`OptError::InvalidMaxIter`] if `max_iter == 0`.
    pub fn new(
        tol_cost: Option<f64>, target_chi2: Option<f64>, max_iter: Option<usize>,
    ) -> OptResult<Self> {
        if tol_cost.is_none() && target_chi2.is_none() && max_iter.is_none() {
            return Err(OptError::NoTolerancesProvided);
        }
        verify_tol_cost(tol_cost)?;
        verify_target_chi2(target_chi2)?;
        if let Some(max_iter) = max_iter {
            if max_iter == 0 {
                return Err(OptError::InvalidMaxIter {
                    max_iter,
                    reason: "Maximum iterations must be greater than zero.",
                });
            }
        }
        Ok(Self { tol_cost, target_chi2, max_iter })
    }
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            tol_cost: Some(DEFAULT_TOL_COST),
            target_chi2: Some(DEFAULT_TARGET_CHI2),
            max_iter: Some(DEFAULT_MAX_ITER),
        }
    }
}

/// Engine-level configuration.
///
/// Default: default [`Tolerances`], Gauss–Newton, not verbose, L-BFGS
/// memory [`crate::optimization::engine::DEFAULT_LBFGS_MEM`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineOptions {
    pub tols: Tolerances,
    pub solver: SolverKind,
    pub verbose: bool,
    pub lbfgs_mem: Option<usize>,
}

impl EngineOptions {
    /// # Errors
    /// - [`OptError::InvalidLBFGSMem`] if `lbfgs_mem == Some(0)`.
    pub fn new(
        tols: Tolerances, solver: SolverKind, verbose: bool, lbfgs_mem: Option<usize>,
    ) -> OptResult<Self> {
        if let Some(m) = lbfgs_mem {
            if m == 0 {
                return Err(OptError::InvalidLBFGSMem {
                    mem: m,
                    reason: "L-BFGS memory must be greater than zero.",
                });
            }
        }
        Ok(Self { tols, solver, verbose, lbfgs_mem })
    }
}

/// Per-iteration summary of a Gauss–Newton run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub phi: f64,
    pub phi_d: f64,
    pub phi_m: f64,
    pub chi2: f64,
    pub rrms: f64,
    /// Accepted step length (`1` for a full Gauss–Newton step).
    pub step: f64,
}

/// Canonical result returned by the engine.
///
/// - `theta_hat`: best transformed model found.
/// - `value`: objective `Φ(θ̂)`.
/// - `converged`: `false` when the run hit `max_iter` or could not make
///   progress.
/// - `status`: human-readable termination status.
/// - `fn_evals`: evaluation counters (argmin's for L-BFGS).
/// - `grad_norm`: norm of the last available gradient, if present.
/// - `history`: per-iteration summaries (Gauss–Newton only).
#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub theta_hat: Theta,
    pub value: f64,
    pub converged: bool,
    pub status: String,
    pub iterations: usize,
    pub fn_evals: FnEvalMap,
    pub grad_norm: Option<f64>,
    pub history: Vec<IterationRecord>,
}

impl OptimOutcome {
    /// Build a validated outcome from raw argmin state.
    ///
    /// A run that stopped because it reached `max_iters` (or never
    /// terminated) is reported as not converged.
    ///
    /// # Errors
    /// - Propagates validation errors for `theta_hat` or `value`.
    pub fn new(
        theta_hat_opt: Option<Theta>, value: f64, termination: TerminationStatus, iterations: u64,
        fn_evals: FnEvalMap, grad: Option<Grad>,
    ) -> OptResult<Self> {
        let theta_hat = validate_theta_hat(theta_hat_opt)?;
        validate_value(value)?;
        let (converged, status) = match &termination {
            TerminationStatus::NotTerminated => (false, "Not terminated".to_string()),
            TerminationStatus::Terminated(TerminationReason::MaxItersReached) => {
                (false, format!("{termination:?}"))
            }
            _ => (true, format!("{termination:?}")),
        };
        let grad_norm = grad.map(|g| g.l2_norm());
        Ok(Self {
            theta_hat,
            value,
            converged,
            status,
            iterations: iterations as usize,
            fn_evals,
            grad_norm,
            history: Vec::new(),
        })
    }
}
