//! Numerical stability utilities.
//!
//! Provides safe implementations of the nonlinear transforms used to move
//! between the optimizer's unconstrained space and the bounded parameter
//! space of the accumulator model, plus the guarded link primitives used by
//! the spike observation model.
//! The functions here follow guarded strategies similar to those
//! in major ML libraries (e.g. PyTorch, TensorFlow), using explicit
//! cutoffs (`x > 20.0`) to keep `f64` arithmetic in a well-conditioned regime.
//!
//! # Provided items
//! - [`EIGEN_EPS`]: eigenvalue floor used when forming pseudoinverses of
//!   observed information matrices.
//! - [`LOGIT_EPS`]: clamp applied before taking a logit so that values
//!   sitting exactly on a bound map to a finite unconstrained coordinate.
//! - [`safe_softplus(x)`] / [`safe_softplus_inv(x)`]: stable `ln(1 + exp(x))`
//!   and its inverse.
//! - [`safe_logistic(x)`] / [`safe_logit(p)`]: stable sigmoid and its inverse.
//! - [`to_bounded`] / [`from_bounded`]: scaled-logistic map between ℝ and an
//!   open interval `(lb, ub)`.
//!
//! # Rationale
//! These transforms are building blocks in optimization and
//! probabilistic modeling whenever parameters must be kept
//! strictly inside a box or strictly positive.

/// Eigenvalues at or below this magnitude are treated as numerically zero.
pub const EIGEN_EPS: f64 = 1e-10;

/// Clamp used before `logit` so that bound-touching values stay finite.
pub const LOGIT_EPS: f64 = 1e-10;

/// Numerically stable softplus: `softplus(x) = ln(1 + exp(x))`.
///
/// Computes softplus without overflow for large positive `x` and
/// with good precision for large negative `x`. This implementation
/// uses a simple piecewise guard:
///
/// - For sufficiently large `x`, `softplus(x) ≈ x + ln1p(exp(-x)) ≈ x`.
/// - Otherwise, it falls back to `ln1p(exp(x))`.
///
/// # Parameters
/// - `x`: real input
///
/// # Returns
/// - `softplus(x)` as `f64`.
pub fn safe_softplus(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp().ln_1p() }
}

/// Stable inverse of softplus on `(0, ∞)`: solves for `t` in
/// `softplus(t) = x`, returning `t = ln(exp(x) - 1)`.
///
/// - For sufficiently large `x`, `ln(exp(x) - 1) ≈ x`.
/// - Otherwise, it uses `ln(expm1(x))`.
///
/// # Parameters
/// - `x`: a positive real (the softplus output), must be finite and `> 0`.
pub fn safe_softplus_inv(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp_m1().ln() }
}

/// Numerically stable logistic function `σ(x) = 1 / (1 + exp(-x))`.
///
/// Branches on the sign of `x` so that `exp` is only ever evaluated on a
/// non-positive argument.
pub fn safe_logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Inverse of [`safe_logistic`] on `(0, 1)`.
///
/// `p` is clamped to `[LOGIT_EPS, 1 - LOGIT_EPS]` first.
pub fn safe_logit(p: f64) -> f64 {
    let p = p.clamp(LOGIT_EPS, 1.0 - LOGIT_EPS);
    p.ln() - (-p).ln_1p()
}

/// Map an unconstrained coordinate `u` into `(lb, ub)`:
/// `x = lb + (ub - lb)·σ(u)`.
pub fn to_bounded(u: f64, lb: f64, ub: f64) -> f64 {
    lb + (ub - lb) * safe_logistic(u)
}

/// Inverse of [`to_bounded`]. Values on or outside the bounds are clamped.
pub fn from_bounded(x: f64, lb: f64, ub: f64) -> f64 {
    safe_logit((x - lb) / (ub - lb))
}
