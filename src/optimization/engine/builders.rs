//! engine::builders — L-BFGS solver construction helpers.
//!
//! Purpose
//! -------
//! Build argmin L-BFGS solvers for the alternative (quasi-Newton) inversion
//! path, hiding argmin's generic wiring behind the crate's numeric aliases.
//!
//! Key behaviors
//! -------------
//! - One builder per supported line search (More–Thuente, Hager–Zhang).
//! - History size comes from `opts.lbfgs_mem` or [`DEFAULT_LBFGS_MEM`].
//! - [`configure_lbfgs`] applies the cost tolerance. `tol_cost` is relative
//!   (`|ΔΦ| / Φ`) while argmin's `with_tolerance_cost` is absolute, so the
//!   value is scaled by the start cost `Φ(θ₀)` first
//!   ([`absolute_cost_tolerance`]).
//!
//! Conventions
//! -----------
//! - Builders never set `theta0` or `max_iters`; the runner does.
//! - `target_chi2` has no argmin equivalent and is ignored here.
use argmin::solver::quasinewton::LBFGS;

use crate::optimization::{
    engine::{
        traits::EngineOptions,
        types::{
            Cost, DEFAULT_LBFGS_MEM, Grad, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente,
            MoreThuenteLS, Theta,
        },
    },
    errors::OptResult,
};

/// Construct L-BFGS with Hager–Zhang line search.
///
/// `phi0` is the objective at the start point.
///
/// # Errors
/// - `OptError` (via `From<argmin::core::Error>`) if argmin rejects the
///   cost tolerance.
pub fn build_optimizer_hager_zhang(opts: &EngineOptions, phi0: Cost) -> OptResult<LbfgsHagerZhang> {
    let hager_zhang = HagerZhangLS::new();
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    let lbfgs = LbfgsHagerZhang::new(hager_zhang, mem);
    configure_lbfgs(lbfgs, opts, phi0)
}

/// Construct L-BFGS with More–Thuente line search.
///
/// # Errors
/// - `OptError` (via `From<argmin::core::Error>`) if argmin rejects the
///   cost tolerance.
pub fn build_optimizer_more_thuente(opts: &EngineOptions, phi0: Cost) -> OptResult<LbfgsMoreThuente> {
    let more_thuente = MoreThuenteLS::new();
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    let lbfgs = LbfgsMoreThuente::new(more_thuente, mem);
    configure_lbfgs(lbfgs, opts, phi0)
}

/// Apply `opts.tols.tol_cost` to an L-BFGS solver of any line-search type.
///
/// When the tolerance is `None` argmin's default stays in effect.
pub fn configure_lbfgs<L>(
    mut solver: LBFGS<L, Theta, Grad, Cost>, opts: &EngineOptions, phi0: Cost,
) -> OptResult<LBFGS<L, Theta, Grad, Cost>> {
    if let Some(c) = opts.tols.tol_cost {
        solver = solver.with_tolerance_cost(absolute_cost_tolerance(c, phi0))?;
    }
    Ok(solver)
}

/// Absolute cost change equivalent to the relative tolerance `rel` at
/// start cost `phi0`.
///
/// A non-finite start cost leaves `rel` unscaled.
pub fn absolute_cost_tolerance(rel: f64, phi0: Cost) -> f64 {
    if phi0.is_finite() { rel * phi0.abs() } else { rel }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::engine::traits::{LineSearcher, SolverKind, Tolerances};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Construction with both line searches and with/without explicit memory.
    // - Tolerance wiring through `configure_lbfgs`.
    // - Scaling of the relative tolerance to argmin's absolute one.
    //
    // They intentionally DO NOT cover:
    // - Executor behavior, tested with `run_lbfgs`.
    // -------------------------------------------------------------------------

    fn opts(searcher: LineSearcher, mem: Option<usize>, tol_cost: Option<f64>) -> EngineOptions {
        let tols = Tolerances::new(tol_cost, None, Some(50)).expect("Tolerances should be valid");
        EngineOptions::new(tols, SolverKind::Lbfgs(searcher), false, mem)
            .expect("EngineOptions should be valid")
    }

    #[test]
    fn builders_accept_default_and_explicit_memory() {
        assert!(build_optimizer_hager_zhang(&opts(LineSearcher::HagerZhang, None, Some(1e-6)), 10.0).is_ok());
        assert!(build_optimizer_hager_zhang(&opts(LineSearcher::HagerZhang, Some(11), None), 10.0).is_ok());
        assert!(build_optimizer_more_thuente(&opts(LineSearcher::MoreThuente, None, Some(1e-6)), 10.0).is_ok());
        assert!(build_optimizer_more_thuente(&opts(LineSearcher::MoreThuente, Some(9), None), 10.0).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // `configure_lbfgs` succeeds with and without a cost tolerance.
    fn configure_lbfgs_handles_optional_tolerance() {
        let raw = LBFGS::new(HagerZhangLS::new(), DEFAULT_LBFGS_MEM);
        assert!(configure_lbfgs(raw, &opts(LineSearcher::HagerZhang, None, Some(1e-8)), 3.0).is_ok());

        let raw = LBFGS::new(MoreThuenteLS::new(), DEFAULT_LBFGS_MEM);
        assert!(configure_lbfgs(raw, &opts(LineSearcher::MoreThuente, None, None), 3.0).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // A 1 % relative tolerance at start cost 250 becomes an absolute change
    // of 2.5; a non-finite start cost leaves the tolerance as given.
    fn relative_tolerance_scales_with_start_cost() {
        assert!((absolute_cost_tolerance(0.01, 250.0) - 2.5).abs() < 1e-12);
        assert!((absolute_cost_tolerance(0.01, -250.0) - 2.5).abs() < 1e-12);
        assert_eq!(absolute_cost_tolerance(0.01, 0.0), 0.0);
        assert_eq!(absolute_cost_tolerance(0.01, f64::INFINITY), 0.01);
    }
}
