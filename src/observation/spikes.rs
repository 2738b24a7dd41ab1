//! Poisson spike-count readout.
//!
//! Purpose
//! -------
//! Score observed spike counts against the firing rate each latent bin
//! implies, producing the per-bin log-emission rows consumed by the forward
//! pass.
//!
//! Conventions
//! -----------
//! - Counts in a bin of width `dt` are Poisson with mean `rate·dt`.
//! - Rates are floored at [`RATE_FLOOR`] Hz so that a link evaluating to a
//!   non-positive rate yields a very small, finite likelihood.
//! - Neurons are conditionally independent given the latent state; their
//!   log-likelihoods add.
use crate::{
    latent::grid::LatentGrid,
    observation::{
        errors::{ObservationError, ObservationResult},
        links::NeuronParams,
    },
};
use ndarray::{Array2, ArrayView1, ArrayView2, Zip};
use statrs::function::gamma::ln_gamma;

/// Smallest firing rate used in the Poisson likelihood, in Hz.
pub const RATE_FLOOR: f64 = 1e-12;

/// `k·ln(rate·dt) − rate·dt − lnΓ(k + 1)`.
pub fn poisson_log_likelihood(count: u32, rate: f64, dt: f64) -> f64 {
    let mu = rate.max(RATE_FLOOR) * dt;
    let k = count as f64;
    k * mu.ln() - mu - ln_gamma(k + 1.0)
}

/// Firing rate of every neuron at every grid centre, `(neurons × bins)`.
pub fn rate_table(neurons: &[NeuronParams], grid: &LatentGrid) -> Array2<f64> {
    Array2::from_shape_fn((neurons.len(), grid.n_bins()), |(k, j)| {
        neurons[k].rate(grid.centers[j]).max(RATE_FLOOR)
    })
}

/// Log-emission matrix `(T × bins)` for one trial's spike counts.
///
/// Row `t` holds `Σ_k ln Poisson(counts[t, k] | rate_k(x_j)·dt)` for every
/// bin `j`.
///
/// Errors
/// ------
/// - `ObservationError::NeuronCountMismatch` when `counts` and `rates`
///   disagree on the neuron count.
/// - `ObservationError::InvalidTimeStep` for a non-positive `dt`.
pub fn emission_log_matrix(
    rates: ArrayView2<f64>, counts: ArrayView2<u32>, dt: f64,
) -> ObservationResult<Array2<f64>> {
    if !(dt.is_finite() && dt > 0.0) {
        return Err(ObservationError::InvalidTimeStep { dt });
    }
    if counts.ncols() != rates.nrows() {
        return Err(ObservationError::NeuronCountMismatch {
            expected: rates.nrows(),
            found: counts.ncols(),
        });
    }
    let mu = rates.mapv(|r| r * dt);
    let ln_mu = mu.mapv(f64::ln);
    let mut out = Array2::<f64>::zeros((counts.nrows(), rates.ncols()));
    for (mut row, counts_t) in out.rows_mut().into_iter().zip(counts.rows()) {
        emission_log_row(row.view_mut(), counts_t, &mu, &ln_mu);
    }
    Ok(out)
}

fn emission_log_row(
    mut row: ndarray::ArrayViewMut1<f64>, counts: ArrayView1<u32>, mu: &Array2<f64>,
    ln_mu: &Array2<f64>,
) {
    for (k, &count) in counts.iter().enumerate() {
        let kf = count as f64;
        let log_fact = ln_gamma(kf + 1.0);
        Zip::from(&mut row)
            .and(mu.row(k))
            .and(ln_mu.row(k))
            .for_each(|acc, &m, &lm| *acc += kf * lm - m - log_fact);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::links::LinkFunction;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // The Poisson log-pmf matches the closed form.
    //
    // Given
    // -----
    // - k = 3, rate 50 Hz, dt = 0.02 (mean 1).
    //
    // Expect
    // ------
    // - ln(e^{-1}/3!) = −1 − ln 6.
    fn poisson_matches_closed_form() {
        let ll = poisson_log_likelihood(3, 50.0, 0.02);

        assert_relative_eq!(ll, -1.0 - 6.0f64.ln(), epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Non-positive rates are floored, not propagated as NaN.
    //
    // Given
    // -----
    // - rate −5 with k = 0 and k = 2.
    //
    // Expect
    // ------
    // - k = 0 gives ≈ 0; k = 2 gives a large negative finite value.
    fn non_positive_rates_are_floored() {
        let zero = poisson_log_likelihood(0, -5.0, 0.01);
        let two = poisson_log_likelihood(2, -5.0, 0.01);

        assert!(zero.abs() < 1e-12);
        assert!(two.is_finite() && two < -50.0);
    }

    #[test]
    // Purpose
    // -------
    // Emission rows sum per-neuron Poisson terms at every grid centre.
    //
    // Given
    // -----
    // - Two exponential neurons on a 5-bin grid, two time bins of counts.
    //
    // Expect
    // ------
    // - Each entry equals the sum of `poisson_log_likelihood` over neurons.
    fn emission_matrix_sums_neurons() {
        let grid = LatentGrid::new(2.0, 5).unwrap();
        let neurons = vec![
            NeuronParams::new(LinkFunction::Exponential, vec![2.0, 0.5]).unwrap(),
            NeuronParams::new(LinkFunction::Exponential, vec![3.0, -0.3]).unwrap(),
        ];
        let counts = array![[0u32, 2], [1, 0]];
        let rates = rate_table(&neurons, &grid);

        let le = emission_log_matrix(rates.view(), counts.view(), 0.01).unwrap();

        for t in 0..2 {
            for j in 0..5 {
                let x = grid.centers[j];
                let expected = poisson_log_likelihood(counts[[t, 0]], neurons[0].rate(x), 0.01)
                    + poisson_log_likelihood(counts[[t, 1]], neurons[1].rate(x), 0.01);
                assert_relative_eq!(le[[t, j]], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // A neuron-count mismatch is reported.
    //
    // Given
    // -----
    // - Rates for one neuron and counts for two.
    //
    // Expect
    // ------
    // - `NeuronCountMismatch { expected: 1, found: 2 }`.
    fn emission_matrix_rejects_neuron_mismatch() {
        let rates = Array2::<f64>::ones((1, 5));
        let counts = Array2::<u32>::zeros((3, 2));

        assert!(matches!(
            emission_log_matrix(rates.view(), counts.view(), 0.01),
            Err(ObservationError::NeuronCountMismatch { expected: 1, found: 2 })
        ));
    }
}
