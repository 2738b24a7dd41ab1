//! inference::hessian — observed-information intervals for fitted models.
//!
//! Purpose
//! -------
//! Turn a finite-difference Hessian of `−ℓ` at the fitted vector into
//! standard errors and Wald intervals for every free parameter, in natural
//! units.
//!
//! Key behaviors
//! -------------
//! - The gradient of `−ℓ` over the free entries is taken by central
//!   differences with a relative step of [`GRAD_STEP`], one-sided where the
//!   step would cross a bound; [`hessian_from_gradient`] differentiates it once
//!   more and symmetrizes.
//! - The Hessian is copied into a `nalgebra::DMatrix` and decomposed with
//!   `symmetric_eigen`. Eigenvalues at or below [`EIGEN_EPS`] are dropped,
//!   which gives the pseudoinverse of the nearest positive semi-definite
//!   matrix.
//! - Parameters loading on a dropped direction are reported in
//!   [`HessianIntervals::unreliable`] and logged with `warn!`.
//!
//! Conventions
//! -----------
//! - Indices in the returned struct refer to the full flat vector.
//! - Intervals are `θ̂ ± z·SE` with `z` the standard normal quantile for
//!   [`WALD_LEVEL`]; they are not clipped to the parameter bounds.
use crate::{
    inference::errors::{InferenceError, InferenceResult},
    latent::data::Dataset,
    models::{errors::ModelError, likelihood::AccumulatorModel},
    optimization::{
        loglik_optimizer::{Grad, Theta, finite_diff::hessian_from_gradient},
        numerical_stability::transformations::EIGEN_EPS,
    },
};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView1};
use statrs::distribution::{ContinuousCDF, Normal};
use std::cell::RefCell;
use tracing::{debug, warn};

/// Coverage of the Wald intervals.
pub const WALD_LEVEL: f64 = 0.95;

/// Relative step of the inner gradient. Larger than `√ε` so that rounding
/// noise in `ℓ` is not amplified twice.
pub const GRAD_STEP: f64 = 1e-4;

/// Squared eigenvector loading above which a parameter counts as depending
/// on a dropped direction.
pub const UNRELIABLE_LOADING: f64 = 1e-2;

/// Observed-information intervals over the free parameters.
///
/// Fields
/// ------
/// - `indices`: positions of the free parameters in the full vector.
/// - `estimate`, `std_errors`, `lower`, `upper`: one entry per free
///   parameter, in the order of `indices`.
/// - `hessian`: Hessian of `−ℓ` over the free parameters.
/// - `eigenvalues`: its eigenvalues, in `nalgebra`'s order.
/// - `unreliable`: full-vector indices loading on dropped eigenvalues.
#[derive(Debug, Clone, PartialEq)]
pub struct HessianIntervals {
    pub indices: Vec<usize>,
    pub estimate: Array1<f64>,
    pub std_errors: Array1<f64>,
    pub lower: Array1<f64>,
    pub upper: Array1<f64>,
    pub hessian: Array2<f64>,
    pub eigenvalues: Array1<f64>,
    pub unreliable: Vec<usize>,
}

impl HessianIntervals {
    /// `(n × 2)` lower/upper table over the full vector; fixed entries get
    /// the degenerate interval `[θ̂, θ̂]`.
    pub fn confidence_table(&self, theta_hat: ArrayView1<f64>) -> Array2<f64> {
        let mut table = Array2::zeros((theta_hat.len(), 2));
        for (i, &value) in theta_hat.iter().enumerate() {
            table[[i, 0]] = value;
            table[[i, 1]] = value;
        }
        for (k, &i) in self.indices.iter().enumerate() {
            table[[i, 0]] = self.lower[k];
            table[[i, 1]] = self.upper[k];
        }
        table
    }
}

/// Wald intervals from the observed information at `theta_hat`.
///
/// Parameters
/// ----------
/// - `model`: the fitted model; its free mask selects the parameters.
/// - `data`: the dataset the model was fitted on.
/// - `theta_hat`: full natural-units vector at the optimum.
///
/// Errors
/// ------
/// - `InferenceError::EstimateLengthMismatch` for a wrong-length estimate.
/// - `InferenceError::NoFreeParameters` when every entry is fixed.
/// - `InferenceError::Model` when the likelihood fails near `theta_hat`.
/// - `InferenceError::Optimization` when no finite Hessian can be formed.
pub fn hessian_intervals(
    model: &AccumulatorModel, data: &Dataset, theta_hat: ArrayView1<f64>,
) -> InferenceResult<HessianIntervals> {
    let n_params = model.layout.n_params();
    if theta_hat.len() != n_params {
        return Err(InferenceError::EstimateLengthMismatch {
            expected: n_params,
            actual: theta_hat.len(),
        });
    }
    let indices = model.spec.free_indices();
    if indices.is_empty() {
        return Err(InferenceError::NoFreeParameters);
    }
    let estimate: Theta = indices.iter().map(|&i| theta_hat[i]).collect();

    let closure_err: RefCell<Option<ModelError>> = RefCell::new(None);
    let neg_loglik = |x: &Theta| -> f64 {
        let mut full = theta_hat.to_owned();
        for (&i, &xi) in indices.iter().zip(x.iter()) {
            full[i] = xi;
        }
        match model.log_likelihood(full.view(), data) {
            Ok(ll) => -ll,
            Err(err) => {
                closure_err.borrow_mut().get_or_insert(err);
                f64::NAN
            }
        }
    };
    let gradient = |x: &Theta| -> Grad {
        let mut xt = x.clone();
        let mut grad = Grad::zeros(x.len());
        for (k, &i) in indices.iter().enumerate() {
            let h = GRAD_STEP * x[k].abs().max(1.0);
            let a = (x[k] - h).max(model.spec.lower[i]);
            let b = (x[k] + h).min(model.spec.upper[i]);
            xt[k] = b;
            let fb = neg_loglik(&xt);
            xt[k] = a;
            let fa = neg_loglik(&xt);
            xt[k] = x[k];
            grad[k] = (fb - fa) / (b - a);
        }
        grad
    };

    debug!(n_free = indices.len(), "computing observed information");
    let hessian = hessian_from_gradient(&gradient, &estimate);
    if let Some(err) = closure_err.take() {
        return Err(err.into());
    }
    let hessian = hessian?;

    let (variance, eigenvalues, weak) = pseudo_inverse_diagonal(&hessian);
    let unreliable: Vec<usize> = weak.into_iter().map(|r| indices[r]).collect();
    if !unreliable.is_empty() {
        let names = model.layout.names();
        let flagged: Vec<&str> = unreliable.iter().map(|&i| names[i].as_str()).collect();
        warn!(?flagged, "Hessian is not positive definite; intervals are unreliable");
    }

    let z = Normal::new(0.0, 1.0)
        .map_err(|e| InferenceError::Quantile { reason: e.to_string() })?
        .inverse_cdf(0.5 + WALD_LEVEL / 2.0);
    let std_errors = variance.mapv(f64::sqrt);
    let lower = &estimate - &(z * &std_errors);
    let upper = &estimate + &(z * &std_errors);

    Ok(HessianIntervals {
        indices,
        estimate,
        std_errors,
        lower,
        upper,
        hessian,
        eigenvalues,
        unreliable,
    })
}

/// Diagonal of the PSD pseudoinverse, the eigenvalues, and the rows loading
/// on dropped eigenvalues.
fn pseudo_inverse_diagonal(hessian: &Array2<f64>) -> (Array1<f64>, Array1<f64>, Vec<usize>) {
    let n = hessian.nrows();
    let mut info = DMatrix::<f64>::zeros(n, n);
    for j in 0..n {
        for i in 0..n {
            info[(i, j)] = hessian[[i, j]];
        }
    }
    let eigen = info.symmetric_eigen();
    let q = &eigen.eigenvectors;
    let eigenvalues: Array1<f64> = eigen.eigenvalues.iter().copied().collect();

    let mut variance = Array1::<f64>::zeros(n);
    let mut weak = Vec::new();
    for r in 0..n {
        let mut dropped_loading = 0.0;
        for (k, &lambda) in eigenvalues.iter().enumerate() {
            let load = q[(r, k)] * q[(r, k)];
            if lambda > EIGEN_EPS {
                variance[r] += load / lambda;
            } else {
                dropped_loading += load;
            }
        }
        if dropped_loading > UNRELIABLE_LOADING {
            weak.push(r);
        }
    }
    (variance, eigenvalues, weak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        latent::{
            data::{ClickTrain, Trial, TrialSet},
            params::N_LATENT,
        },
        models::{
            layout::{ParamLayout, ParamSpec},
            options::ModelOptions,
        },
    };
    use ndarray::array;

    fn model(free: &[usize]) -> AccumulatorModel {
        let layout = ParamLayout::choice_only(1);
        let spec = ParamSpec::default_for(&layout).free_only(free);
        AccumulatorModel::new(layout, spec, ModelOptions::new(11, 0.01).unwrap()).unwrap()
    }

    fn dataset() -> Dataset {
        let trials = (0..30)
            .map(|k| {
                let right = if k % 3 == 0 { vec![0.02, 0.05, 0.07] } else { vec![0.03] };
                let left = if k % 2 == 0 { vec![0.01, 0.04] } else { vec![0.06] };
                Trial::new(ClickTrain::new(left, right).unwrap(), 10, 0.01)
                    .unwrap()
                    .with_choice(k % 5 < 3)
            })
            .collect();
        Dataset::new(vec![TrialSet::new(trials).unwrap()], 0.01).unwrap()
    }

    fn theta() -> Array1<f64> {
        array![0.2, 8.0, 0.0, 2.0, 0.5, 0.8, 0.05, 0.1, 0.1]
    }

    #[test]
    // Purpose
    // -------
    // Intervals are centred on the estimate and only cover free entries.
    //
    // Given
    // -----
    // - A choice model with bias and lapse free.
    //
    // Expect
    // ------
    // - Two finite intervals with lower <= θ̂ <= upper, an exactly symmetric
    //   Hessian, and fixed entries collapsed in the confidence table.
    fn intervals_cover_free_parameters() {
        let m = model(&[N_LATENT, N_LATENT + 1]);
        let th = theta();

        let out = hessian_intervals(&m, &dataset(), th.view()).unwrap();

        assert_eq!(out.indices, vec![N_LATENT, N_LATENT + 1]);
        for k in 0..2 {
            assert!(out.std_errors[k].is_finite() && out.std_errors[k] >= 0.0);
            assert!(out.lower[k] <= out.estimate[k] && out.estimate[k] <= out.upper[k]);
        }
        assert_eq!(out.hessian[[0, 1]], out.hessian[[1, 0]]);

        let table = out.confidence_table(th.view());
        assert_eq!(table.dim(), (th.len(), 2));
        assert_eq!(table[[1, 0]], th[1]);
        assert_eq!(table[[1, 1]], th[1]);
        assert_eq!(table[[N_LATENT, 0]], out.lower[0]);
    }

    #[test]
    // Purpose
    // -------
    // Dropped eigenvalues give a PSD pseudoinverse and flag the rows that
    // load on them.
    //
    // Given
    // -----
    // - H = diag(4, 0) and the rank-one H = [[1, 1], [1, 1]].
    //
    // Expect
    // ------
    // - diag(4, 0): variances (0.25, 0), row 1 flagged.
    // - Rank one: variances (0.25, 0.25), both rows flagged.
    fn pseudo_inverse_drops_flat_directions() {
        let (var, _, weak) = pseudo_inverse_diagonal(&array![[4.0, 0.0], [0.0, 0.0]]);
        assert!((var[0] - 0.25).abs() < 1e-12);
        assert!(var[1].abs() < 1e-12);
        assert_eq!(weak, vec![1]);

        let (var, eig, weak) = pseudo_inverse_diagonal(&array![[1.0, 1.0], [1.0, 1.0]]);
        assert!((var[0] - 0.25).abs() < 1e-12);
        assert!((var[1] - 0.25).abs() < 1e-12);
        assert!(eig.iter().any(|&l| l.abs() < 1e-12));
        assert_eq!(weak, vec![0, 1]);
    }

    #[test]
    // Purpose
    // -------
    // Input validation happens before any derivative is taken.
    //
    // Given
    // -----
    // - A short estimate, and a model with no free parameters.
    //
    // Expect
    // ------
    // - `EstimateLengthMismatch` and `NoFreeParameters`.
    fn invalid_inputs_are_rejected() {
        let data = dataset();
        let short = array![1.0, 2.0];

        assert!(matches!(
            hessian_intervals(&model(&[N_LATENT]), &data, short.view()),
            Err(InferenceError::EstimateLengthMismatch { .. })
        ));
        assert_eq!(
            hessian_intervals(&model(&[]), &data, theta().view()),
            Err(InferenceError::NoFreeParameters)
        );
    }
}
