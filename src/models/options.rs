//! Model configuration: grid resolution, time step, adaptation mode,
//! observation switches, and the optional Gaussian prior.
use crate::{
    latent::{clicks::AdaptationMode, grid::validate_bin_count},
    models::errors::{ModelError, ModelResult},
};
use ndarray::{Array1, ArrayView1};

/// Default number of latent bins.
pub const DEFAULT_N_BINS: usize = 53;

/// Default time step in seconds.
pub const DEFAULT_DT: f64 = 1e-2;

/// `ModelOptions` — structural settings fixed for a whole fit.
///
/// Fields
/// ------
/// - `n_bins`: latent grid size, odd and `>= 3`.
/// - `dt`: time step in seconds; must match the dataset's.
/// - `adaptation`: within- or cross-stream click adaptation.
/// - `include_choice`: whether choices enter the likelihood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelOptions {
    pub n_bins: usize,
    pub dt: f64,
    pub adaptation: AdaptationMode,
    pub include_choice: bool,
}

impl ModelOptions {
    /// Errors
    /// ------
    /// - `ModelError::Latent(InvalidBinCount)` for an even or too small grid.
    /// - `ModelError::InvalidOptions` for a non-positive or non-finite `dt`.
    pub fn new(n_bins: usize, dt: f64) -> ModelResult<Self> {
        validate_bin_count(n_bins)?;
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ModelError::InvalidOptions { reason: "dt must be finite and > 0" });
        }
        Ok(ModelOptions { n_bins, dt, adaptation: AdaptationMode::Within, include_choice: true })
    }

    pub fn with_cross_adaptation(mut self, cross: bool) -> Self {
        self.adaptation = if cross { AdaptationMode::Cross } else { AdaptationMode::Within };
        self
    }

    pub fn with_choice(mut self, include: bool) -> Self {
        self.include_choice = include;
        self
    }
}

impl Default for ModelOptions {
    fn default() -> Self {
        ModelOptions {
            n_bins: DEFAULT_N_BINS,
            dt: DEFAULT_DT,
            adaptation: AdaptationMode::Within,
            include_choice: true,
        }
    }
}

/// Gaussian penalty `−Σ β_k (p_k − μ_k)²` over the observation block.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianPrior {
    pub mean: Array1<f64>,
    pub precision: Array1<f64>,
}

impl GaussianPrior {
    /// Errors
    /// ------
    /// - `ModelError::PriorLengthMismatch` when the lengths differ.
    /// - `ModelError::InvalidPrior` for non-finite means or negative weights.
    pub fn new(mean: Array1<f64>, precision: Array1<f64>) -> ModelResult<Self> {
        if mean.len() != precision.len() {
            return Err(ModelError::PriorLengthMismatch {
                expected: mean.len(),
                found: precision.len(),
            });
        }
        for (index, (&mu, &beta)) in mean.iter().zip(precision.iter()).enumerate() {
            if !mu.is_finite() {
                return Err(ModelError::InvalidPrior { index, reason: "mean must be finite" });
            }
            if !(beta.is_finite() && beta >= 0.0) {
                return Err(ModelError::InvalidPrior { index, reason: "weight must be >= 0" });
            }
        }
        Ok(GaussianPrior { mean, precision })
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Penalty for the observation block `values`.
    pub fn log_density(&self, values: ArrayView1<f64>) -> ModelResult<f64> {
        if values.len() != self.len() {
            return Err(ModelError::PriorLengthMismatch { expected: self.len(), found: values.len() });
        }
        Ok(-values
            .iter()
            .zip(self.mean.iter().zip(self.precision.iter()))
            .map(|(&p, (&mu, &beta))| beta * (p - mu) * (p - mu))
            .sum::<f64>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Option validation rejects invalid grids and time steps.
    //
    // Given
    // -----
    // - n_bins = 52 and dt = 0.
    //
    // Expect
    // ------
    // - A latent `InvalidBinCount` and `InvalidOptions`.
    fn options_validate_grid_and_time_step() {
        assert!(matches!(ModelOptions::new(52, 0.01), Err(ModelError::Latent(_))));
        assert!(matches!(ModelOptions::new(53, 0.0), Err(ModelError::InvalidOptions { .. })));

        let opts = ModelOptions::new(21, 0.01).unwrap().with_cross_adaptation(true).with_choice(false);
        assert_eq!(opts.adaptation, AdaptationMode::Cross);
        assert!(!opts.include_choice);
    }

    #[test]
    // Purpose
    // -------
    // The prior penalty is a weighted sum of squared deviations.
    //
    // Given
    // -----
    // - μ = (1, 0), β = (2, 0.5), p = (3, −2).
    //
    // Expect
    // ------
    // - −(2·4 + 0.5·4) = −10.
    fn prior_penalizes_squared_deviation() {
        let prior = GaussianPrior::new(array![1.0, 0.0], array![2.0, 0.5]).unwrap();

        let lp = prior.log_density(array![3.0, -2.0].view()).unwrap();

        assert_eq!(lp, -10.0);
        assert!(matches!(
            GaussianPrior::new(array![0.0], array![-1.0]),
            Err(ModelError::InvalidPrior { index: 0, .. })
        ));
    }
}
