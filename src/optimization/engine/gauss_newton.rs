//! engine::gauss_newton — regularized Gauss–Newton with backtracking.
//!
//! Purpose
//! -------
//! Minimize `Φ(y) = ||r(y)||² + λ ||r_m(y)||²` for a [`LeastSquaresProblem`],
//! where `r` is the weighted data residual and `r_m = C (y - y_ref)` the
//! constraint residual. This is the classic smooth-inversion iteration.
//!
//! Key behaviors
//! -------------
//! - Each iteration solves the normal equations
//!   `(JᵀJ + λCᵀC) Δ = Jᵀr - λCᵀr_m` with nalgebra (Cholesky, SVD
//!   pseudo-inverse when rank-deficient).
//! - The step is accepted at the largest `τ ∈ {1, ½, ¼, …} ≥ MIN_STEP`
//!   that strictly decreases a finite `Φ`.
//! - Stops when `χ² <= target_chi2`, when the relative decrease of `Φ`
//!   falls below `tol_cost`, when the predicted decrease of a full step is
//!   negligible (stationary point), when no step decreases `Φ`, or at
//!   `max_iter`.
//!
//! Invariants & assumptions
//! ------------------------
//! - `converged == false` only for the `max_iter` and failed line-search
//!   exits; both still return the best model found.
//! - Forward failures abort the run and are returned unchanged.
//! - A non-finite `Φ` at the start model is an error; at a trial step it
//!   only shortens the step.
//!
//! Conventions
//! -----------
//! - Iteration summaries are logged at `info` when `verbose`, else `debug`.
//! - `fn_evals` counts `"cost_count"` (misfit evaluations) and
//!   `"jacobian_count"`.
use crate::optimization::{
    engine::{
        traits::{EngineOptions, IterationRecord, LeastSquaresProblem, Misfit, OptimOutcome},
        types::{FnEvalMap, Jacobian, Theta},
        validation::validate_value,
    },
    errors::{OptError, OptResult},
};
use log::{Level, debug, log};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView2};

/// Smallest accepted line-search step.
pub const MIN_STEP: f64 = 1.0 / 1024.0;

/// Relative predicted decrease below which the iterate is stationary.
const STATIONARY_TOL: f64 = 1.5e-8;

/// Relative singular-value cutoff of the normal-equation solve.
const RANK_TOL: f64 = 1e-12;

/// Run regularized Gauss–Newton from `theta0`.
///
/// # Errors
/// - [`OptError::NonFiniteCost`] if `Φ(theta0)` is not finite.
/// - [`OptError::SingularSystem`] if the normal equations hold non-finite
///   entries.
/// - Any error from `misfit` or `jacobian` (forward failures included).
pub fn run_gauss_newton<P: LeastSquaresProblem + ?Sized>(
    problem: &P, theta0: Theta, opts: &EngineOptions,
) -> OptResult<OptimOutcome> {
    let level = if opts.verbose { Level::Info } else { Level::Debug };
    let max_iter = opts.tols.max_iter.unwrap_or(usize::MAX);
    let mut cost_count = 0u64;
    let mut jacobian_count = 0u64;

    let mut theta = theta0;
    let mut current = problem.misfit(&theta)?;
    cost_count += 1;
    validate_value(current.phi)?;
    let mut history = vec![record(0, &current, 0.0)];
    log!(
        level,
        "gauss-newton init: phi = {:.6e}, chi2 = {:.4}, rrms = {:.2}%",
        current.phi,
        current.chi2,
        current.rrms
    );

    let mut iterations = 0usize;
    let (converged, status) = loop {
        if let Some(target) = opts.tols.target_chi2 {
            if current.chi2 <= target {
                break (true, format!("Target chi2 {target} reached"));
            }
        }
        if iterations >= max_iter {
            break (false, "Maximum iterations reached".to_string());
        }
        iterations += 1;

        let jac = problem.jacobian(&theta, &current)?;
        jacobian_count += 1;
        let (delta, rhs) = normal_step(&jac, problem.constraint_matrix(), problem.lambda(), &current)?;
        let predicted = delta.dot(&rhs);
        if predicted <= STATIONARY_TOL * current.phi.max(f64::MIN_POSITIVE) {
            break (true, "Stationary point reached".to_string());
        }

        let mut step = 1.0;
        let mut accepted = None;
        while step >= MIN_STEP {
            let trial = &theta + &(step * &delta);
            let m = problem.misfit(&trial)?;
            cost_count += 1;
            if m.phi.is_finite() && m.phi < current.phi {
                accepted = Some((trial, m));
                break;
            }
            step *= 0.5;
        }
        let Some((trial, next)) = accepted else {
            log!(level, "gauss-newton iter {iterations}: no step decreased the objective");
            break (false, "Line search could not decrease the objective".to_string());
        };

        let rel_change = (current.phi - next.phi) / current.phi.max(f64::MIN_POSITIVE);
        theta = trial;
        current = next;
        history.push(record(iterations, &current, step));
        log!(
            level,
            "gauss-newton iter {iterations}: phi = {:.6e}, chi2 = {:.4}, rrms = {:.2}%, step = {step}",
            current.phi,
            current.chi2,
            current.rrms
        );

        if let Some(tol) = opts.tols.tol_cost {
            if rel_change < tol {
                break (true, format!("Relative objective change {rel_change:.3e} below {tol}"));
            }
        }
    };

    let mut fn_evals = FnEvalMap::new();
    fn_evals.insert("cost_count".to_string(), cost_count);
    fn_evals.insert("jacobian_count".to_string(), jacobian_count);
    Ok(OptimOutcome {
        theta_hat: theta,
        value: current.phi,
        converged,
        status,
        iterations,
        fn_evals,
        grad_norm: None,
        history,
    })
}

fn record(iteration: usize, m: &Misfit, step: f64) -> IterationRecord {
    IterationRecord {
        iteration,
        phi: m.phi,
        phi_d: m.phi_d,
        phi_m: m.phi_m,
        chi2: m.chi2,
        rrms: m.rrms,
        step,
    }
}

/// Gauss–Newton update and the right-hand side it solves for.
fn normal_step(
    jac: &Jacobian, c: ArrayView2<'_, f64>, lambda: f64, at: &Misfit,
) -> OptResult<(Array1<f64>, Array1<f64>)> {
    let mut a = jac.t().dot(jac);
    a.scaled_add(lambda, &c.t().dot(&c));
    let rhs = jac.t().dot(&at.residual) - lambda * c.t().dot(&at.roughness);
    let delta = solve_normal_equations(&a, &rhs)?;
    Ok((delta, rhs))
}

/// Solve the symmetric system `a x = b`.
///
/// Cholesky first. A failed or numerically rank-deficient factorization
/// falls back to the SVD pseudo-inverse, which truncates singular values
/// below `RANK_TOL · σ_max` and leaves the corresponding directions
/// unchanged (zero step). Parameters without sensitivity or constraint,
/// such as Pelton columns the data cannot see, therefore never abort a run.
///
/// # Errors
/// - [`OptError::SingularSystem`] for mismatched shapes, non-finite entries,
///   or a non-finite solution.
pub fn solve_normal_equations(a: &Array2<f64>, b: &Array1<f64>) -> OptResult<Array1<f64>> {
    let n = b.len();
    if a.dim() != (n, n) || a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return Err(OptError::SingularSystem { dim: n });
    }
    let a_na = DMatrix::from_fn(n, n, |i, j| a[[i, j]]);
    let b_na = DVector::from_iterator(n, b.iter().copied());
    let x = match a_na.clone().cholesky().filter(|chol| well_conditioned(chol.l_dirty())) {
        Some(chol) => chol.solve(&b_na),
        None => {
            let svd = a_na.svd(true, true);
            let sigma_max = svd.singular_values.iter().fold(0.0_f64, |m, &s| m.max(s));
            debug!("normal equations rank-deficient (dim {n}); using SVD pseudo-inverse");
            svd.solve(&b_na, RANK_TOL * sigma_max).map_err(|_| OptError::SingularSystem { dim: n })?
        }
    };
    let x = Array1::from_iter(x.iter().copied());
    if x.iter().any(|v| !v.is_finite()) {
        return Err(OptError::SingularSystem { dim: n });
    }
    Ok(x)
}

/// Squared pivot ratio of a Cholesky factor above `RANK_TOL`.
fn well_conditioned(l: &DMatrix<f64>) -> bool {
    let (lo, hi) = (0..l.nrows())
        .map(|i| l[(i, i)] * l[(i, i)])
        .fold((f64::INFINITY, 0.0_f64), |(lo, hi), p| (lo.min(p), hi.max(p)));
    hi > 0.0 && lo > RANK_TOL * hi
}
