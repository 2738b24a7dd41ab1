//! loglik_optimizer::finite_diff — finite-difference derivatives with error
//! capture.
//!
//! The accumulator likelihood has no analytic gradient, so every derivative
//! the fitting and interval code needs comes from here:
//!
//! - [`forward_gradient`] is the retry path when a central-difference
//!   gradient of the cost failed or came back non-finite.
//! - [`hessian_from_gradient`] differentiates a gradient map once more for
//!   observed-information intervals.
//!
//! `finitediff` closures return plain numbers, so an objective that fails
//! inside one parks its first error in a `RefCell<Option<Error>>` and
//! returns `NaN`; the helpers here re-raise that error.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        Grad, Theta,
        types::Hessian,
        validation::{validate_grad, validate_hessian},
    },
};
use argmin::core::Error;
use finitediff::FiniteDiff;
use std::cell::RefCell;

/// Forward-difference gradient of `cost` at `theta`.
///
/// `parked` is cleared first; an error the closure parked during the sweep
/// wins over any gradient validation failure.
pub fn forward_gradient<C: Fn(&Theta) -> f64>(
    theta: &Theta, cost: &C, parked: &RefCell<Option<Error>>,
) -> OptResult<Grad> {
    parked.replace(None);
    let grad = theta.forward_diff(cost);
    if let Some(err) = parked.take() {
        return Err(err.into());
    }
    validate_grad(&grad, theta.len())?;
    Ok(grad)
}

/// Symmetric finite-difference Hessian of the gradient map `grad` at
/// `theta`.
///
/// A central-difference estimate is used when every entry is finite; a
/// forward-difference estimate otherwise.
///
/// # Errors
/// - `HessianDimMismatch` / `InvalidHessian` when the forward estimate is
///   also unusable.
pub fn hessian_from_gradient<G: Fn(&Theta) -> Grad>(grad: &G, theta: &Theta) -> OptResult<Hessian> {
    let n = theta.len();
    let central = theta.central_hessian(grad);
    let raw = if validate_hessian(&central, n).is_ok() {
        central
    } else {
        let forward = theta.forward_hessian(grad);
        validate_hessian(&forward, n)?;
        forward
    };
    Ok((&raw + &raw.t()) * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::errors::OptError;
    use argmin::core::ArgminError;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Forward differences recover the gradient of a smooth log-sum-exp.
    //
    // Given
    // -----
    // - c(θ) = ln(e^θ0 + e^θ1) at (0, 0).
    //
    // Expect
    // ------
    // - Gradient ≈ (0.5, 0.5) to forward-difference accuracy.
    fn forward_gradient_matches_softmax_weights() {
        let theta: Theta = array![0.0, 0.0];
        let parked: RefCell<Option<Error>> = RefCell::new(None);
        let cost = |x: &Theta| x.mapv(f64::exp).sum().ln();

        let g = forward_gradient(&theta, &cost, &parked).unwrap();

        for v in g.iter() {
            assert!((v - 0.5).abs() < 1e-5, "{g:?}");
        }
    }

    #[test]
    // Purpose
    // -------
    // An error parked by the objective is re-raised.
    //
    // Given
    // -----
    // - A cost that parks an argmin `NotImplemented` error and returns NaN.
    //
    // Expect
    // ------
    // - The mapped `OptError`, not `InvalidGradient`.
    fn parked_error_wins_over_validation() {
        let theta: Theta = array![1.0];
        let parked: RefCell<Option<Error>> = RefCell::new(None);
        let cost = |_: &Theta| {
            parked.replace(Some(ArgminError::NotImplemented { text: "cost".into() }.into()));
            f64::NAN
        };

        let err = forward_gradient(&theta, &cost, &parked).unwrap_err();

        assert!(
            matches!(err, OptError::NotImplemented { .. } | OptError::BackendError { .. }),
            "{err:?}"
        );
    }

    #[test]
    // Purpose
    // -------
    // A NaN cost without a parked error fails gradient validation.
    //
    // Given
    // -----
    // - c(θ) = NaN.
    //
    // Expect
    // ------
    // - `OptError::InvalidGradient`.
    fn nan_cost_is_invalid_gradient() {
        let theta: Theta = array![0.0, 1.0];
        let parked: RefCell<Option<Error>> = RefCell::new(None);

        let err = forward_gradient(&theta, &|_: &Theta| f64::NAN, &parked).unwrap_err();

        assert!(matches!(err, OptError::InvalidGradient { .. }));
    }

    #[test]
    // Purpose
    // -------
    // The Hessian of a Gaussian log-density's gradient is minus the
    // precision and is returned exactly symmetric.
    //
    // Given
    // -----
    // - ∇ℓ(θ) = −P θ with P = [[2, 0.5], [0.5, 1]].
    //
    // Expect
    // ------
    // - H ≈ −P with H[0,1] == H[1,0].
    fn hessian_of_gaussian_score_is_negative_precision() {
        let p = array![[2.0, 0.5], [0.5, 1.0]];
        let score = |theta: &Theta| -p.dot(theta);

        let h = hessian_from_gradient(&score, &array![0.3, -0.7]).unwrap();

        assert_eq!(h[[0, 1]], h[[1, 0]]);
        for ((i, j), v) in h.indexed_iter() {
            assert!((v + p[[i, j]]).abs() < 1e-5);
        }
    }

    #[test]
    // Purpose
    // -------
    // A gradient map that is NaN everywhere has no usable Hessian.
    //
    // Given
    // -----
    // - g(θ) = (NaN).
    //
    // Expect
    // ------
    // - `OptError::InvalidHessian`.
    fn nan_gradient_map_is_invalid_hessian() {
        let err = hessian_from_gradient(&|_: &Theta| array![f64::NAN], &array![0.0]).unwrap_err();

        assert!(matches!(err, OptError::InvalidHessian { .. }));
    }
}
