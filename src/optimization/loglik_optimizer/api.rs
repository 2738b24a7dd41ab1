//! High-level entry point for maximizing a user-provided `LogLikelihood`.
//!
//! This selects an L-BFGS solver with either Hager–Zhang or More–Thuente line
//! search, wraps the model in an `ArgMinAdapter` (which *minimizes* `-ℓ(θ)`),
//! and delegates the run to `run_solver`.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        OptimOutcome, Theta,
        adapter::{ArgMinAdapter, BestPoint},
        builders::{lbfgs_hager_zhang, lbfgs_more_thuente},
        run::run_solver,
        traits::{LineSearcher, LogLikelihood, MLEOptions},
    },
};

/// Maximize a log-likelihood `ℓ(θ)` using L-BFGS with the chosen line search.
///
/// # Behavior
/// - Validates the initial guess via `f.check(theta0, data)`.
/// - Wraps `(f, data)` in an `ArgMinAdapter` exposing `c(θ) = -ℓ(θ)`.
/// - Builds the solver for `opts.line_searcher` and runs it.
///
/// # Errors
/// - Propagates any error from `f.check`, from the builders, and from the
///   run itself (including errors raised by `f.value`).
/// - A run that fails after a finite evaluation reports
///   `OptError::StoppedWithBest` carrying the best point it evaluated.
///
/// # Example
/// ```no_run
/// use ndarray::array;
/// use pulse_ddm::optimization::{
///     errors::OptResult,
///     loglik_optimizer::{LogLikelihood, MLEOptions, Theta, maximize},
/// };
///
/// struct Concave;
/// impl LogLikelihood for Concave {
///     type Data = ();
///     fn value(&self, theta: &Theta, _: &()) -> OptResult<f64> {
///         Ok(-theta.dot(theta))
///     }
///     fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
///         Ok(())
///     }
/// }
///
/// let out = maximize(&Concave, array![0.1, -0.2, 0.3], &(), &MLEOptions::default())?;
/// println!("θ̂ = {:?}", out.theta_hat);
/// # Ok::<(), pulse_ddm::optimization::errors::OptError>(())
/// ```
pub fn maximize<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    f.check(&theta0, data)?;
    let best = BestPoint::default();
    let problem = ArgMinAdapter::new(f, data).tracking(&best);
    let outcome = match opts.line_searcher {
        LineSearcher::MoreThuente => {
            run_solver(theta0, opts, problem, lbfgs_more_thuente(opts)?)
        }
        LineSearcher::HagerZhang => {
            run_solver(theta0, opts, problem, lbfgs_hager_zhang(opts)?)
        }
    };
    outcome.map_err(|err| best.attach(err))
}
