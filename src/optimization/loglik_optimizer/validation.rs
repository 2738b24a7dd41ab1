//! loglik_optimizer::validation — finiteness and shape checks for optimizer
//! inputs and outputs.
//!
//! Every check returns `OptResult` so callers can chain them with `?`.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{Grad, Theta, types::Hessian},
};

/// Why `tol` is unusable as a stopping threshold, if it is.
fn threshold_problem(tol: f64) -> Option<&'static str> {
    if !tol.is_finite() {
        Some("threshold must be finite")
    } else if tol <= 0.0 {
        Some("threshold must be positive")
    } else {
        None
    }
}

pub fn verify_tol_grad(tol: Option<f64>) -> OptResult<()> {
    match tol.and_then(|t| threshold_problem(t).map(|reason| (t, reason))) {
        Some((tol, reason)) => Err(OptError::InvalidTolGrad { tol, reason }),
        None => Ok(()),
    }
}

pub fn verify_tol_cost(tol: Option<f64>) -> OptResult<()> {
    match tol.and_then(|t| threshold_problem(t).map(|reason| (t, reason))) {
        Some((tol, reason)) => Err(OptError::InvalidTolCost { tol, reason }),
        None => Ok(()),
    }
}

/// Length `n` with finite entries.
pub fn validate_grad(grad: &Grad, n: usize) -> OptResult<()> {
    if grad.len() != n {
        return Err(OptError::GradientDimMismatch { expected: n, found: grad.len() });
    }
    match grad.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(OptError::InvalidGradient {
            index,
            value: grad[index],
            reason: "finite-difference step hit a non-finite likelihood",
        }),
        None => Ok(()),
    }
}

/// The best point reported by the solver, required present and finite.
pub fn validate_theta_hat(theta_hat: Option<Theta>) -> OptResult<Theta> {
    let theta = theta_hat.ok_or(OptError::MissingThetaHat)?;
    match theta.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(OptError::InvalidThetaHat {
            index,
            value: theta[index],
            reason: "estimates must be finite",
        }),
        None => Ok(theta),
    }
}

pub fn validate_value(value: f64) -> OptResult<()> {
    if value.is_finite() { Ok(()) } else { Err(OptError::NonFiniteCost { value }) }
}

/// Square `n × n` with finite entries.
pub fn validate_hessian(hessian: &Hessian, n: usize) -> OptResult<()> {
    if hessian.dim() != (n, n) {
        return Err(OptError::HessianDimMismatch { expected: n, found: hessian.dim() });
    }
    match hessian.indexed_iter().find(|(_, v)| !v.is_finite()) {
        Some(((row, col), &value)) => Err(OptError::InvalidHessian { row, col, value }),
        None => Ok(()),
    }
}
