//! loglik_optimizer::traits — the objective interface and optimizer settings.
//!
//! An accumulator model is fitted by maximizing `ℓ(θ)` over its free
//! parameters in unconstrained space; argmin minimizes, so the adapter feeds
//! it `c(θ) = -ℓ(θ)`. Gradients supplied through [`LogLikelihood::grad`] are
//! gradients of `ℓ` and are negated there too.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        Cost, FnEvalMap, Grad, Theta,
        validation::{validate_theta_hat, validate_value, verify_tol_cost, verify_tol_grad},
    },
};
use argmin::core::{TerminationReason, TerminationStatus};
use argmin_math::ArgminL2Norm;
use std::str::FromStr;

/// An objective the optimizer can maximize.
///
/// `value` returns `ℓ(θ)` and must report bad inputs as errors, never panic.
/// `check` runs once on the start point before any iteration. Without an
/// analytic `grad`, finite differences of `value` are used.
pub trait LogLikelihood {
    type Data: 'static;

    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<Cost>;

    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()>;

    fn grad(&self, _theta: &Theta, _data: &Self::Data) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }
}

/// Line search run inside each L-BFGS step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = OptError;

    /// Case-insensitive; `-` and `_` separators are ignored, so
    /// `"more_thuente"` and `"Hager-Zhang"` both parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String =
            s.chars().filter(|c| !matches!(c, '-' | '_')).collect::<String>().to_lowercase();
        match key.as_str() {
            "morethuente" => Ok(Self::MoreThuente),
            "hagerzhang" => Ok(Self::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "expected 'MoreThuente' or 'HagerZhang'",
            }),
        }
    }
}

/// Settings for one maximization run.
///
/// `verbose` only has an effect with the `obs_slog` feature, where it
/// attaches a per-iteration terminal logger. `lbfgs_mem = None` means
/// [`DEFAULT_LBFGS_MEM`](crate::optimization::loglik_optimizer::DEFAULT_LBFGS_MEM).
///
/// The default stops at a gradient norm of 1e-5, a cost change of 1e-9 or
/// 200 iterations, with a More–Thuente line search.
#[derive(Debug, Clone, PartialEq)]
pub struct MLEOptions {
    pub tols: Tolerances,
    pub line_searcher: LineSearcher,
    pub verbose: bool,
    pub lbfgs_mem: Option<usize>,
}

impl MLEOptions {
    /// # Errors
    /// - `InvalidLBFGSMem` for a history size of zero. Tolerance values are
    ///   checked by [`Tolerances::new`].
    pub fn new(
        tols: Tolerances, line_searcher: LineSearcher, verbose: bool, lbfgs_mem: Option<usize>,
    ) -> OptResult<Self> {
        if lbfgs_mem == Some(0) {
            return Err(OptError::InvalidLBFGSMem {
                mem: 0,
                reason: "history size must be positive",
            });
        }
        Ok(Self { tols, line_searcher, verbose, lbfgs_mem })
    }
}

impl Default for MLEOptions {
    fn default() -> Self {
        Self {
            tols: Tolerances { tol_grad: Some(1e-5), tol_cost: Some(1e-9), max_iter: Some(200) },
            line_searcher: LineSearcher::MoreThuente,
            verbose: false,
            lbfgs_mem: None,
        }
    }
}

/// Stopping rules. Each is optional but at least one must be set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    /// Gradient-norm threshold.
    pub tol_grad: Option<f64>,
    /// Threshold on the change in cost between iterations.
    pub tol_cost: Option<f64>,
    pub max_iter: Option<usize>,
}

impl Tolerances {
    /// # Errors
    /// - `NoTolerancesProvided` when every rule is `None`.
    /// - `InvalidTolGrad` / `InvalidTolCost` for non-finite or non-positive
    ///   thresholds.
    /// - `InvalidMaxIter` for a cap of zero.
    pub fn new(
        tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    ) -> OptResult<Self> {
        if (tol_grad, tol_cost, max_iter) == (None, None, None) {
            return Err(OptError::NoTolerancesProvided);
        }
        verify_tol_grad(tol_grad)?;
        verify_tol_cost(tol_cost)?;
        if max_iter == Some(0) {
            return Err(OptError::InvalidMaxIter {
                max_iter: 0,
                reason: "iteration cap must be positive",
            });
        }
        Ok(Self { tol_grad, tol_cost, max_iter })
    }
}

/// Result of [`maximize`](super::maximize), in log-likelihood space.
///
/// `theta_hat` is the best point the solver visited and `value` its `ℓ`.
/// `converged` is set only for a tolerance stop or a reached target cost;
/// running out of iterations leaves it `false`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub theta_hat: Theta,
    pub value: f64,
    pub converged: bool,
    pub status: String,
    pub iterations: usize,
    pub fn_evals: FnEvalMap,
    pub grad_norm: Option<f64>,
}

impl OptimOutcome {
    /// # Errors
    /// - `MissingThetaHat` / invalid values from validation.
    pub fn new(
        theta_hat_opt: Option<Theta>, value: f64, termination: TerminationStatus, iterations: u64,
        fn_evals: FnEvalMap, grad: Option<Grad>,
    ) -> OptResult<Self> {
        let theta_hat = validate_theta_hat(theta_hat_opt)?;
        validate_value(value)?;
        let converged = is_converged(&termination);
        let status = match &termination {
            TerminationStatus::NotTerminated => "running".to_string(),
            TerminationStatus::Terminated(reason) => reason.text().to_string(),
        };
        Ok(Self {
            theta_hat,
            value,
            converged,
            status,
            iterations: iterations as usize,
            fn_evals,
            grad_norm: grad.map(|g| g.l2_norm()),
        })
    }
}

fn is_converged(termination: &TerminationStatus) -> bool {
    matches!(
        termination,
        TerminationStatus::Terminated(
            TerminationReason::SolverConverged | TerminationReason::TargetCostReached
        )
    )
}
