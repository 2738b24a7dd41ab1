//! One-step transition matrices on the latent grid.
//!
//! Purpose
//! -------
//! Build the column-stochastic matrix `F` with `F[[j, i]] = P(x_{t+1} in bin j
//! | x_t = centre i)` for one time step of the bounded accumulator.
//!
//! Key behaviors
//! -------------
//! - From an inner centre `x` the next state is Gaussian with mean
//!   `x·e^{λdt} + u·(e^{λdt} − 1)/λ` (`u·dt` when `|λ| <` [`LAMBDA_EPS`]) and
//!   variance `σ²_step`. `u` is the net input rate over the step.
//! - Bin masses are differences of the Gaussian CDF at the bin edges. Mass
//!   below `−B` goes to bin `0`, mass above `B` to bin `n − 1`.
//! - With `σ²_step == 0` the mass is split between the two centres
//!   bracketing the mean by linear interpolation.
//! - The two edge columns are unit vectors (absorbing bounds).
//!
//! Invariants
//! ----------
//! - Every column sums to `1` within floating-point rounding; the upper tail
//!   is computed with `erfc` directly rather than `1 − Φ`.
//! - The target buffer is fully overwritten; its previous contents never
//!   leak into the result.
use crate::latent::{
    errors::{LatentError, LatentResult},
    grid::LatentGrid,
    params::LatentParams,
};
use ndarray::{Array1, Array2, ArrayViewMut1};
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

/// Below this `|λ|` the drift term uses its `λ → 0` limit `u·dt`.
pub const LAMBDA_EPS: f64 = 1e-12;

/// Standard deviations below this are treated as zero variance.
pub const SIGMA_FLOOR: f64 = 1e-12;

/// Fill `f` with the transition matrix for one step.
///
/// Parameters
/// ----------
/// - `f`: `(n × n)` output buffer, overwritten.
/// - `lambda`: leak/instability rate.
/// - `sigma2_step`: total variance added over the step.
/// - `net_rate`: net input rate `u` over the step.
/// - `grid`: latent grid; `n = grid.n_bins()`.
/// - `dt`: step length in seconds.
///
/// Errors
/// ------
/// - `LatentError::BufferSizeMismatch` when `f` is not `n × n`.
/// - `LatentError::InvalidParam` for a negative or non-finite variance or a
///   non-finite input.
/// - `LatentError::InvalidTimeStep` when `dt` is not finite and positive.
pub fn transition_matrix(
    f: &mut Array2<f64>, lambda: f64, sigma2_step: f64, net_rate: f64, grid: &LatentGrid, dt: f64,
) -> LatentResult<()> {
    let n = grid.n_bins();
    if f.dim() != (n, n) {
        return Err(LatentError::BufferSizeMismatch { expected: n, found: f.nrows() });
    }
    if !(dt.is_finite() && dt > 0.0) {
        return Err(LatentError::InvalidTimeStep { dt });
    }
    if !(sigma2_step.is_finite() && sigma2_step >= 0.0) {
        return Err(LatentError::InvalidParam {
            name: "step variance",
            value: sigma2_step,
            reason: "must be finite and >= 0",
        });
    }
    if !(net_rate.is_finite() && lambda.is_finite()) {
        return Err(LatentError::InvalidParam {
            name: "net input",
            value: net_rate,
            reason: "drift inputs must be finite",
        });
    }

    f.fill(0.0);
    f[[0, 0]] = 1.0;
    f[[n - 1, n - 1]] = 1.0;

    let growth = (lambda * dt).exp();
    let drift = if lambda.abs() < LAMBDA_EPS {
        net_rate * dt
    } else {
        net_rate * (lambda * dt).exp_m1() / lambda
    };
    let sigma = sigma2_step.sqrt();
    let edges = grid.edges();

    for i in 1..n - 1 {
        let mean = grid.centers[i] * growth + drift;
        let column = f.column_mut(i);
        if sigma > SIGMA_FLOOR {
            gaussian_column(column, mean, sigma, edges);
        } else {
            point_column(column, mean, &grid.centers);
        }
    }
    Ok(())
}

/// Transition matrix for a click-free step under `params`.
pub fn no_click_matrix(params: &LatentParams, grid: &LatentGrid, dt: f64) -> LatentResult<Array2<f64>> {
    let n = grid.n_bins();
    let mut f = Array2::<f64>::zeros((n, n));
    transition_matrix(&mut f, params.lambda, params.sigma2_a * dt, 0.0, grid, dt)?;
    Ok(f)
}

/// Variance added over a step carrying total click magnitude `magnitude`.
pub fn step_variance(params: &LatentParams, dt: f64, magnitude: f64) -> f64 {
    params.sigma2_a * dt + params.sigma2_s * magnitude
}

fn gaussian_column(mut column: ArrayViewMut1<f64>, mean: f64, sigma: f64, edges: &Array1<f64>) {
    let n = column.len();
    let scale = sigma * SQRT_2;
    let lower = |e: f64| 0.5 * erfc(-(e - mean) / scale);
    let upper = |e: f64| 0.5 * erfc((e - mean) / scale);

    let mut previous = lower(edges[0]);
    column[0] = previous;
    for j in 1..n - 1 {
        let e = edges[j];
        let current = lower(e);
        // above the mean, differences of the upper tail keep precision
        let mass = if e > mean { upper(edges[j - 1]) - upper(e) } else { current - previous };
        previous = current;
        column[j] = mass.max(0.0);
    }
    column[n - 1] = upper(edges[n - 2]);
}

fn point_column(mut column: ArrayViewMut1<f64>, mean: f64, centers: &Array1<f64>) {
    let n = column.len();
    if mean <= centers[0] {
        column[0] = 1.0;
        return;
    }
    if mean >= centers[n - 1] {
        column[n - 1] = 1.0;
        return;
    }
    // centres are sorted: first index whose centre exceeds the mean
    let hi = centers.iter().position(|&c| c > mean).unwrap_or(n - 1);
    let lo = hi - 1;
    let w = (mean - centers[lo]) / (centers[hi] - centers[lo]);
    column[lo] += 1.0 - w;
    column[hi] += w;
}
