//! loglik_optimizer::run — drive a configured L-BFGS solver to termination.
//!
//! The solver minimizes `c(θ) = -ℓ(θ)`; everything returned from here is
//! translated back to log-likelihood space.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        Grad, LogLikelihood, MLEOptions, OptimOutcome, Theta, adapter::ArgMinAdapter,
    },
};
use argmin::core::{CostFunction, Executor, IterState, Solver, State};
#[cfg(feature = "obs_slog")]
use argmin::core::observers::ObserverMode;
use tracing::debug;

type LbfgsState = IterState<Theta, Grad, (), (), (), f64>;

/// Execute `solver` on `problem` from `theta0`.
///
/// The iteration cap comes from `opts.tols.max_iter`. With the `obs_slog`
/// feature and `opts.verbose`, a terminal slog observer reports every
/// iteration. The best point seen by the solver is returned, not the last.
///
/// # Errors
/// - Objective errors raised during the run and solver failures, as
///   `OptError`.
/// - A missing or non-finite best point when the outcome is assembled.
pub fn run_solver<'a, F, S>(
    theta0: Theta, opts: &MLEOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: LogLikelihood,
    S: Solver<ArgMinAdapter<'a, F>, LbfgsState> + Send + 'static,
{
    let start_ll = -problem.cost(&theta0)?;
    debug!(n_free = theta0.len(), loglik = start_ll, "starting L-BFGS");

    let max_iters = opts.tols.max_iter.map(|m| m as u64);
    let executor = Executor::new(problem, solver).configure(|state| {
        let state = state.param(theta0);
        match max_iters {
            Some(m) => state.max_iters(m),
            None => state,
        }
    });
    #[cfg(feature = "obs_slog")]
    let executor = if opts.verbose {
        executor.add_observer(argmin_observer_slog::SlogLogger::term_noblock(), ObserverMode::Always)
    } else {
        executor
    };

    let mut state = executor.run()?.state().clone();
    let loglik = -state.get_best_cost();
    let iterations = state.get_iter();
    debug!(
        iterations,
        loglik,
        gain = loglik - start_ll,
        status = ?state.get_termination_status(),
        "L-BFGS finished"
    );
    OptimOutcome::new(
        state.take_best_param(),
        loglik,
        state.get_termination_status().clone(),
        iterations,
        state.get_func_counts().clone(),
        state.take_gradient(),
    )
}
