//! loglik_optimizer::adapter — present a [`LogLikelihood`] to argmin.
//!
//! argmin minimizes, so the adapter reports `c(θ) = -ℓ(θ)`. The accumulator
//! likelihood has no analytic gradient; its gradient is a finite difference
//! of `c` itself and needs no sign change.
//!
//! An optional [`BestPoint`] records the best finite evaluation so a run
//! that stops on an error still yields its progress.
use std::{cell::RefCell, sync::Mutex};

use crate::optimization::{
    errors::OptError,
    loglik_optimizer::{
        finite_diff::forward_gradient,
        traits::LogLikelihood,
        types::{Cost, Grad, Theta},
        validation::validate_grad,
    },
};
use argmin::core::{CostFunction, Error, Gradient};
use finitediff::FiniteDiff;
use tracing::trace;

/// Best finite `(θ, ℓ(θ))` among the evaluations of one run.
#[derive(Debug, Default)]
pub struct BestPoint(Mutex<Option<(Theta, f64)>>);

impl BestPoint {
    fn offer(&self, theta: &Theta, loglik: f64) {
        if let Ok(mut slot) = self.0.lock() {
            if slot.as_ref().is_none_or(|(_, best)| loglik > *best) {
                *slot = Some((theta.clone(), loglik));
            }
        }
    }

    pub fn get(&self) -> Option<(Theta, f64)> {
        self.0.lock().ok().and_then(|slot| slot.clone())
    }

    /// Wrap `err` in [`OptError::StoppedWithBest`] when a point was recorded.
    pub fn attach(&self, err: OptError) -> OptError {
        match self.get() {
            Some((theta, value)) => OptError::StoppedWithBest { cause: Box::new(err), theta, value },
            None => err,
        }
    }
}

/// A borrowed objective and its data, viewed as an argmin problem.
#[derive(Debug, Clone)]
pub struct ArgMinAdapter<'a, F: LogLikelihood> {
    pub f: &'a F,
    pub data: &'a F::Data,
    best: Option<&'a BestPoint>,
}

impl<'a, F: LogLikelihood> ArgMinAdapter<'a, F> {
    pub fn new(f: &'a F, data: &'a F::Data) -> Self {
        Self { f, data, best: None }
    }

    /// Record every finite cost evaluation in `best`.
    pub fn tracking(mut self, best: &'a BestPoint) -> Self {
        self.best = Some(best);
        self
    }

    /// `c(θ)` as a plain number for `finitediff`; the first failure is
    /// parked in `parked` and reported as `NaN`.
    fn parked_cost(&self, theta: &Theta, parked: &RefCell<Option<Error>>) -> f64 {
        self.cost(theta).unwrap_or_else(|e| {
            let mut slot = parked.borrow_mut();
            if slot.is_none() {
                *slot = Some(e);
            }
            f64::NAN
        })
    }
}

impl<F: LogLikelihood> CostFunction for ArgMinAdapter<'_, F> {
    type Param = Theta;
    type Output = Cost;

    /// `-ℓ(θ)`, or `NonFiniteCost` when `ℓ(θ)` is not finite.
    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        let ll = self.f.value(theta, self.data)?;
        if !ll.is_finite() {
            return Err(OptError::NonFiniteCost { value: ll }.into());
        }
        if let Some(best) = self.best {
            best.offer(theta, ll);
        }
        Ok(-ll)
    }
}

impl<F: LogLikelihood> Gradient for ArgMinAdapter<'_, F> {
    type Param = Theta;
    type Gradient = Grad;

    /// `-∇ℓ(θ)` when the objective supplies it. Otherwise a central
    /// difference of `c`, retried once with forward differences when a cost
    /// evaluation failed or the central result is not finite.
    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        let n = theta.len();
        match self.f.grad(theta, self.data) {
            Ok(g) => {
                validate_grad(&g, n)?;
                Ok(-g)
            }
            Err(OptError::GradientNotImplemented) => {
                let parked = RefCell::new(None);
                let cost = |t: &Theta| self.parked_cost(t, &parked);
                let central = theta.central_diff(&cost);
                if parked.borrow().is_none() && validate_grad(&central, n).is_ok() {
                    return Ok(central);
                }
                trace!("central gradient unusable, retrying with forward differences");
                Ok(forward_gradient(theta, &cost, &parked)?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::errors::OptResult;
    use ndarray::array;

    struct Quadratic;

    impl LogLikelihood for Quadratic {
        type Data = ();

        fn value(&self, theta: &Theta, _: &()) -> OptResult<f64> {
            Ok(-(theta[0] - 1.0).powi(2) - 2.0 * (theta[1] + 0.5).powi(2))
        }

        fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
            Ok(())
        }
    }

    #[test]
    // Purpose
    // -------
    // The cost is the negated log-likelihood and the FD gradient points
    // along the cost's slope.
    //
    // Given
    // -----
    // - A concave quadratic ℓ with maximum at (1, -0.5), evaluated at 0.
    //
    // Expect
    // ------
    // - c(0) = 1.5 and ∇c(0) ≈ (-2, 2).
    fn cost_and_fd_gradient_follow_sign_convention() {
        let problem = ArgMinAdapter::new(&Quadratic, &());
        let theta = array![0.0, 0.0];

        let c = problem.cost(&theta).unwrap();
        let g = problem.gradient(&theta).unwrap();

        assert!((c - 1.5).abs() < 1e-12);
        assert!((g[0] + 2.0).abs() < 1e-5);
        assert!((g[1] - 2.0).abs() < 1e-5);
    }

    struct Cliff;

    impl LogLikelihood for Cliff {
        type Data = ();

        fn value(&self, theta: &Theta, _: &()) -> OptResult<f64> {
            Ok(if theta[0] > 0.0 { f64::NEG_INFINITY } else { -theta[0] * theta[0] })
        }

        fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
            Ok(())
        }
    }

    #[test]
    // Purpose
    // -------
    // A non-finite log-likelihood surfaces as an error from both the cost
    // and the finite-difference gradient.
    //
    // Given
    // -----
    // - ℓ(θ) = −θ² for θ <= 0 and −∞ beyond, evaluated at θ = 0 and θ = 1.
    //
    // Expect
    // ------
    // - cost(1) fails; gradient(0) fails because every difference scheme
    //   steps into the cliff.
    fn non_finite_loglik_is_an_error() {
        let problem = ArgMinAdapter::new(&Cliff, &());

        assert!(problem.cost(&array![1.0]).is_err());
        assert!(problem.gradient(&array![0.0]).is_err());
    }

    #[test]
    // Purpose
    // -------
    // A tracked adapter keeps the highest finite log-likelihood it has
    // evaluated and ignores failed evaluations.
    //
    // Given
    // -----
    // - The quadratic evaluated at 0, at its maximum (1, -0.5) and at 3.
    // - The cliff evaluated at 1, where ℓ = -∞.
    //
    // Expect
    // ------
    // - The quadratic tracker holds (1, -0.5) with ℓ = 0.
    // - The cliff tracker stays empty and `attach` returns the error as is.
    fn tracker_keeps_best_finite_evaluation() {
        let best = BestPoint::default();
        let problem = ArgMinAdapter::new(&Quadratic, &()).tracking(&best);
        for theta in [array![0.0, 0.0], array![1.0, -0.5], array![3.0, 3.0]] {
            problem.cost(&theta).unwrap();
        }

        let (theta, value) = best.get().unwrap();
        assert_eq!(theta, array![1.0, -0.5]);
        assert_eq!(value, 0.0);

        let empty = BestPoint::default();
        let cliff = ArgMinAdapter::new(&Cliff, &()).tracking(&empty);
        assert!(cliff.cost(&array![1.0]).is_err());
        assert!(empty.get().is_none());
        assert_eq!(empty.attach(OptError::UnknownError), OptError::UnknownError);
    }
}
