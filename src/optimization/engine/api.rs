//! High-level entry points of the inversion engine.
//!
//! [`minimize`] dispatches on [`SolverKind`]: regularized Gauss–Newton (the
//! default) or argmin L-BFGS with the chosen line search. [`minimize_lbfgs`]
//! is usable on any scalar [`Objective`].
use crate::optimization::{
    engine::{
        adapter::ArgMinAdapter,
        builders::{build_optimizer_hager_zhang, build_optimizer_more_thuente},
        gauss_newton::run_gauss_newton,
        run::run_lbfgs,
        traits::{EngineOptions, LeastSquaresProblem, LineSearcher, Objective, OptimOutcome, SolverKind},
        types::Theta,
    },
    errors::OptResult,
};

/// Minimize a regularized least-squares problem from `theta0`.
///
/// # Errors
/// - Validation errors from `problem.check(theta0)`.
/// - Any error raised by the selected solver.
pub fn minimize<P: LeastSquaresProblem>(
    problem: &P, theta0: Theta, opts: &EngineOptions,
) -> OptResult<OptimOutcome> {
    problem.check(&theta0)?;
    match opts.solver {
        SolverKind::GaussNewton => run_gauss_newton(problem, theta0, opts),
        SolverKind::Lbfgs(line_searcher) => run_quasi_newton(problem, theta0, line_searcher, opts),
    }
}

/// Minimize a scalar objective with L-BFGS.
///
/// The line search is taken from `opts.solver`; More–Thuente is used when
/// `opts.solver` is Gauss–Newton.
///
/// # Errors
/// - Validation errors from `f.check(theta0)`.
/// - Objective and argmin errors raised during the run.
pub fn minimize_lbfgs<F: Objective>(f: &F, theta0: Theta, opts: &EngineOptions) -> OptResult<OptimOutcome> {
    f.check(&theta0)?;
    let line_searcher = match opts.solver {
        SolverKind::Lbfgs(line_searcher) => line_searcher,
        SolverKind::GaussNewton => LineSearcher::MoreThuente,
    };
    run_quasi_newton(f, theta0, line_searcher, opts)
}

fn run_quasi_newton<F: Objective>(
    f: &F, theta0: Theta, line_searcher: LineSearcher, opts: &EngineOptions,
) -> OptResult<OptimOutcome> {
    let phi0 = f.value(&theta0)?;
    let problem = ArgMinAdapter::new(f);
    match line_searcher {
        LineSearcher::MoreThuente => {
            let solver = build_optimizer_more_thuente(opts, phi0)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver = build_optimizer_hager_zhang(opts, phi0)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
    }
}
