//! Execution helper that runs an `argmin` solver on an [`Objective`] and
//! returns a crate-friendly [`OptimOutcome`].
use crate::optimization::{
    engine::{
        adapter::ArgMinAdapter,
        traits::{EngineOptions, Objective, OptimOutcome},
        types::{Grad, Theta},
    },
    errors::OptResult,
};
use argmin::core::{CostFunction, Executor, Gradient, State};
use argmin_math::ArgminL2Norm;

/// Run an L-BFGS-type solver from `theta0`.
///
/// - `max_iters` is taken from `opts.tols.max_iter` when present.
/// - With `opts.verbose`, the initial state is logged at `info`, and with
///   the `obs_slog` feature argmin's slog observer is attached as well.
/// - Reaching `max_iters` is reported as `converged == false`.
///
/// # Errors
/// - Any `OptError` raised while evaluating the objective, and argmin
///   backend errors mapped through `From<argmin::core::Error>`.
pub fn run_lbfgs<'a, F, S>(
    theta0: Theta, opts: &EngineOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: Objective,
    S: argmin::core::Solver<
            ArgMinAdapter<'a, F>,
            argmin::core::IterState<Theta, Grad, (), (), (), f64>,
        > + Send
        + 'static,
{
    if opts.verbose {
        log_initial_state(&theta0, &problem)?;
    }
    let mut optimizer = Executor::new(problem, solver);
    optimizer = optimizer.configure(|state| state.param(theta0));
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        optimizer = optimizer.add_observer(observer, argmin::core::observers::ObserverMode::Always);
    }
    if let Some(max_iter) = opts.tols.max_iter {
        optimizer = optimizer.configure(|state| state.max_iters(max_iter as u64));
    }

    let mut result = optimizer.run()?.state().clone();
    let iterations = result.get_iter();
    let function_counts = result.get_func_counts().clone();
    let termination = result.get_termination_status().clone();
    let grad = result.take_gradient();
    let value = result.get_best_cost();
    OptimOutcome::new(result.take_best_param(), value, termination, iterations, function_counts, grad)
}

// ---- Helper Methods ----

fn log_initial_state<F: Objective>(theta0: &Theta, problem: &ArgMinAdapter<'_, F>) -> OptResult<()> {
    let phi0 = problem.cost(theta0)?;
    let g0n = problem.gradient(theta0).ok().map(|g| g.l2_norm());

    log::info!(
        "l-bfgs init: phi(theta0) = {:.6e}{}",
        phi0,
        g0n.map(|n| format!(", ||grad|| = {:.6e}", n)).unwrap_or_default()
    );
    Ok(())
}
