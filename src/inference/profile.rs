//! inference::profile — likelihood-ratio intervals from 1-D likelihood
//! slices.
//!
//! Purpose
//! -------
//! For each free parameter, find where `ℓ` drops by `threshold` (1.92 for a
//! 95% interval) when that parameter alone moves away from its estimate.
//!
//! Key behaviors
//! -------------
//! - [`find_sign_change_roots`] scans a uniform grid for sign changes and
//!   refines each bracket with `argmin`'s `BrentRoot`. Exact zeros on the
//!   grid count as roots. The number of roots equals the number of sign
//!   changes.
//! - [`likelihood_ratio_intervals`] applies it to
//!   `x ↦ ℓ(θ̂ with θ_i = x) − (ℓ̂ − threshold)` over the parameter's
//!   bounds. A missing side falls back to the bound ([`ProfileShape::OpenEnded`]);
//!   more than two roots mark the slice [`ProfileShape::Degenerate`].
//!
//! Conventions
//! -----------
//! - The other parameters stay at `θ̂`; this is a likelihood slice, not a
//!   re-optimized profile.
use crate::{
    inference::errors::{InferenceError, InferenceResult},
    latent::data::Dataset,
    models::likelihood::AccumulatorModel,
};
use argmin::{
    core::{CostFunction, Error, Executor, State},
    solver::brent::BrentRoot,
};
use ndarray::ArrayView1;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::{debug, warn};

/// Half the 95% quantile of χ²₁.
pub const LR_THRESHOLD: f64 = 1.92;

/// Iteration cap for each Brent refinement.
const BRENT_MAX_ITERS: u64 = 100;

/// `CIOptions` — likelihood-ratio interval settings.
///
/// Fields
/// ------
/// - `n_grid`: grid points per parameter range, `>= 2`.
/// - `tol`: Brent tolerance on the root location.
/// - `threshold`: log-likelihood drop defining the interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CIOptions {
    pub n_grid: usize,
    pub tol: f64,
    pub threshold: f64,
}

impl CIOptions {
    /// Errors
    /// ------
    /// - `InferenceError::InvalidOptions` for fewer than 2 grid points or a
    ///   non-positive tolerance or threshold.
    pub fn new(n_grid: usize, tol: f64, threshold: f64) -> InferenceResult<Self> {
        if n_grid < 2 {
            return Err(InferenceError::InvalidOptions { reason: "n_grid must be >= 2" });
        }
        if !(tol.is_finite() && tol > 0.0) {
            return Err(InferenceError::InvalidOptions { reason: "tol must be finite and > 0" });
        }
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(InferenceError::InvalidOptions {
                reason: "threshold must be finite and > 0",
            });
        }
        Ok(CIOptions { n_grid, tol, threshold })
    }

    /// Options whose threshold gives coverage `level` under the χ²₁
    /// approximation.
    pub fn with_level(n_grid: usize, tol: f64, level: f64) -> InferenceResult<Self> {
        if !(level > 0.0 && level < 1.0) {
            return Err(InferenceError::InvalidOptions { reason: "level must lie in (0, 1)" });
        }
        let chi2 = ChiSquared::new(1.0)
            .map_err(|e| InferenceError::Quantile { reason: e.to_string() })?;
        CIOptions::new(n_grid, tol, chi2.inverse_cdf(level) / 2.0)
    }
}

impl Default for CIOptions {
    fn default() -> Self {
        CIOptions { n_grid: 20, tol: 1e-6, threshold: LR_THRESHOLD }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileShape {
    TwoSided,
    OpenEnded,
    Degenerate,
}

/// Likelihood-ratio interval of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileInterval {
    pub index: usize,
    pub name: String,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
    pub shape: ProfileShape,
    pub roots: Vec<f64>,
}

struct Slice<'a, F> {
    f: &'a F,
}

impl<F: Fn(f64) -> InferenceResult<f64>> CostFunction for Slice<'_, F> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, x: &f64) -> Result<f64, Error> {
        Ok((self.f)(*x)?)
    }
}

/// Roots of `f` on `[lo, hi]` located by sign changes on `n_grid` points.
///
/// Errors
/// ------
/// - `InferenceError::InvalidSearchInterval` when `lo >= hi`, either end is
///   not finite, or `n_grid < 2`.
/// - Any error returned by `f`, or a Brent failure.
pub fn find_sign_change_roots<F>(
    f: &F, lo: f64, hi: f64, n_grid: usize, tol: f64,
) -> InferenceResult<Vec<f64>>
where
    F: Fn(f64) -> InferenceResult<f64>,
{
    if !(lo.is_finite() && hi.is_finite() && lo < hi) || n_grid < 2 {
        return Err(InferenceError::InvalidSearchInterval { lo, hi });
    }
    let step = (hi - lo) / (n_grid - 1) as f64;
    let xs: Vec<f64> = (0..n_grid)
        .map(|k| if k + 1 == n_grid { hi } else { lo + k as f64 * step })
        .collect();
    let values = xs.iter().map(|&x| f(x)).collect::<InferenceResult<Vec<f64>>>()?;

    let mut roots = Vec::new();
    for k in 0..n_grid {
        if values[k] == 0.0 {
            roots.push(xs[k]);
            continue;
        }
        if k + 1 < n_grid && values[k] * values[k + 1] < 0.0 {
            roots.push(refine_root(f, xs[k], xs[k + 1], tol)?);
        }
    }
    Ok(roots)
}

fn refine_root<F>(f: &F, a: f64, b: f64, tol: f64) -> InferenceResult<f64>
where
    F: Fn(f64) -> InferenceResult<f64>,
{
    let solver = BrentRoot::new(a, b, tol);
    let result = Executor::new(Slice { f }, solver)
        .configure(|state| state.max_iters(BRENT_MAX_ITERS))
        .run()?;
    let state = result.state();
    let root = state.get_best_param().or(state.get_param()).copied();
    Ok(root.unwrap_or(0.5 * (a + b)))
}

/// Likelihood-ratio intervals for every free parameter of `model`.
///
/// Parameters
/// ----------
/// - `model`: the fitted model; bounds of the free entries set the scan
///   ranges.
/// - `data`: the dataset the model was fitted on.
/// - `theta_hat`: full natural-units vector at the optimum.
/// - `opts`: grid size, root tolerance and threshold.
///
/// Errors
/// ------
/// - `InferenceError::EstimateLengthMismatch`, `NoFreeParameters`.
/// - `InferenceError::Model` when the likelihood fails on the scan.
pub fn likelihood_ratio_intervals(
    model: &AccumulatorModel, data: &Dataset, theta_hat: ArrayView1<f64>, opts: &CIOptions,
) -> InferenceResult<Vec<ProfileInterval>> {
    let n_params = model.layout.n_params();
    if theta_hat.len() != n_params {
        return Err(InferenceError::EstimateLengthMismatch {
            expected: n_params,
            actual: theta_hat.len(),
        });
    }
    let free = model.spec.free_indices();
    if free.is_empty() {
        return Err(InferenceError::NoFreeParameters);
    }
    let ll_hat = model.log_likelihood(theta_hat, data)?;
    let cutoff = ll_hat - opts.threshold;
    let names = model.layout.names();

    free.into_iter()
        .map(|index| {
            let slice = |x: f64| -> InferenceResult<f64> {
                let mut theta = theta_hat.to_owned();
                theta[index] = x;
                Ok(model.log_likelihood(theta.view(), data)? - cutoff)
            };
            let (lo, hi) = (model.spec.lower[index], model.spec.upper[index]);
            let roots = find_sign_change_roots(&slice, lo, hi, opts.n_grid, opts.tol)?;
            let estimate = theta_hat[index];
            let below = roots.iter().copied().filter(|&r| r < estimate).fold(None, max_opt);
            let above = roots.iter().copied().filter(|&r| r > estimate).fold(None, min_opt);
            let shape = match (roots.len(), below, above) {
                (n, _, _) if n > 2 => ProfileShape::Degenerate,
                (_, Some(_), Some(_)) => ProfileShape::TwoSided,
                _ => ProfileShape::OpenEnded,
            };
            let name = names[index].clone();
            match shape {
                ProfileShape::Degenerate => {
                    warn!(parameter = %name, n_roots = roots.len(), "likelihood slice is not unimodal")
                }
                ProfileShape::OpenEnded => {
                    debug!(parameter = %name, "interval reaches a parameter bound")
                }
                ProfileShape::TwoSided => {}
            }
            Ok(ProfileInterval {
                index,
                name,
                estimate,
                lower: below.unwrap_or(lo),
                upper: above.unwrap_or(hi),
                shape,
                roots,
            })
        })
        .collect()
}

fn max_opt(acc: Option<f64>, x: f64) -> Option<f64> {
    Some(acc.map_or(x, |a| a.max(x)))
}

fn min_opt(acc: Option<f64>, x: f64) -> Option<f64> {
    Some(acc.map_or(x, |a| a.min(x)))
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
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Root counting and refinement on analytic curves.
    // - Interval shapes on a small choice model.
    // - Option validation.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // A concave bump crossing the threshold twice yields two roots.
    //
    // Given
    // -----
    // - f(x) = 1.92 − (x − 1)² on [−5, 5].
    //
    // Expect
    // ------
    // - Roots 1 ± √1.92.
    fn concave_bump_has_two_roots() {
        let f = |x: f64| -> InferenceResult<f64> { Ok(LR_THRESHOLD - (x - 1.0) * (x - 1.0)) };

        let roots = find_sign_change_roots(&f, -5.0, 5.0, 21, 1e-10).unwrap();

        assert_eq!(roots.len(), 2);
        assert_abs_diff_eq!(roots[0], 1.0 - LR_THRESHOLD.sqrt(), epsilon = 1e-7);
        assert_abs_diff_eq!(roots[1], 1.0 + LR_THRESHOLD.sqrt(), epsilon = 1e-7);
    }

    #[test]
    // Purpose
    // -------
    // The root count equals the number of sign changes, with exact grid
    // zeros counted once.
    //
    // Given
    // -----
    // - f(x) = (x + 2)(x − 0.5)(x − 3) on [−4, 4] with 17 grid points
    //   (x = 0.5 lands on the grid).
    //
    // Expect
    // ------
    // - Roots −2, 0.5, 3 in increasing order.
    fn cubic_has_three_roots() {
        let f = |x: f64| -> InferenceResult<f64> { Ok((x + 2.0) * (x - 0.5) * (x - 3.0)) };

        let roots = find_sign_change_roots(&f, -4.0, 4.0, 17, 1e-10).unwrap();

        assert_eq!(roots.len(), 3);
        for (r, expected) in roots.iter().zip([-2.0, 0.5, 3.0]) {
            assert_abs_diff_eq!(*r, expected, epsilon = 1e-7);
        }
    }

    #[test]
    // Purpose
    // -------
    // Bad scan ranges and failing curves are reported, not panicked on.
    //
    // Given
    // -----
    // - An inverted range, and a curve that errors.
    //
    // Expect
    // ------
    // - `InvalidSearchInterval` and the curve's own error.
    fn scan_errors_are_reported() {
        let ok = |x: f64| -> InferenceResult<f64> { Ok(x) };
        let failing = |_: f64| -> InferenceResult<f64> { Err(InferenceError::NoFreeParameters) };

        assert!(matches!(
            find_sign_change_roots(&ok, 1.0, -1.0, 5, 1e-8),
            Err(InferenceError::InvalidSearchInterval { .. })
        ));
        assert_eq!(
            find_sign_change_roots(&failing, -1.0, 1.0, 5, 1e-8),
            Err(InferenceError::NoFreeParameters)
        );
    }

    #[test]
    // Purpose
    // -------
    // The default threshold matches the χ²₁ quantile route.
    //
    // Given
    // -----
    // - `CIOptions::with_level(20, 1e-6, 0.95)`.
    //
    // Expect
    // ------
    // - threshold ≈ 1.9207; invalid options are rejected.
    fn level_gives_chi_square_threshold() {
        let opts = CIOptions::with_level(20, 1e-6, 0.95).unwrap();

        assert_abs_diff_eq!(opts.threshold, 1.920_729, epsilon = 1e-5);
        assert!(CIOptions::new(1, 1e-6, 1.92).is_err());
        assert!(CIOptions::with_level(20, 1e-6, 1.0).is_err());
    }

    #[test]
    // Purpose
    // -------
    // On a choice model the bias interval brackets the estimate.
    //
    // Given
    // -----
    // - 40 trials, bias free, evaluated at the bias maximizing ℓ on a fine
    //   grid.
    //
    // Expect
    // ------
    // - lower <= θ̂ <= upper, and ℓ at each interior endpoint is ℓ̂ − 1.92.
    fn bias_interval_brackets_estimate() {
        let layout = ParamLayout::choice_only(1);
        let spec = ParamSpec::default_for(&layout).free_only(&[N_LATENT]);
        let model =
            AccumulatorModel::new(layout, spec, ModelOptions::new(11, 0.01).unwrap()).unwrap();
        let trials = (0..40)
            .map(|k| {
                let right = if k % 2 == 0 { vec![0.02, 0.05] } else { vec![0.03] };
                let left = if k % 3 == 0 { vec![0.01, 0.04, 0.06] } else { vec![0.07] };
                Trial::new(ClickTrain::new(left, right).unwrap(), 10, 0.01)
                    .unwrap()
                    .with_choice(k % 5 < 3)
            })
            .collect();
        let data = Dataset::new(vec![TrialSet::new(trials).unwrap()], 0.01).unwrap();
        let base = array![0.2, 8.0, 0.0, 2.0, 0.5, 0.8, 0.05, 0.0, 0.05];
        let ll_at = |b: f64| {
            let mut t = base.clone();
            t[N_LATENT] = b;
            model.log_likelihood(t.view(), &data).unwrap()
        };
        let best = (0..=400)
            .map(|k| -10.0 + 0.05 * k as f64)
            .fold((f64::NAN, f64::NEG_INFINITY), |acc, b| {
                let ll = ll_at(b);
                if ll > acc.1 { (b, ll) } else { acc }
            });
        let mut theta = base.clone();
        theta[N_LATENT] = best.0;

        let out = likelihood_ratio_intervals(&model, &data, theta.view(), &CIOptions::default())
            .unwrap();

        assert_eq!(out.len(), 1);
        let iv = &out[0];
        assert_eq!(iv.name, "bias");
        assert!(iv.lower <= iv.estimate && iv.estimate <= iv.upper);
        for end in [iv.lower, iv.upper] {
            if end > -10.0 && end < 10.0 {
                assert_abs_diff_eq!(ll_at(end), best.1 - LR_THRESHOLD, epsilon = 1e-3);
            }
        }
    }
}
