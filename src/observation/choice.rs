//! Choice readout from the final accumulator distribution.
//!
//! Purpose
//! -------
//! Map the end-of-trial distribution over bins to the probability of a
//! rightward choice, given a decision bias and a lapse rate.
//!
//! Key behaviors
//! -------------
//! - [`choice_weights`] gives each bin's fraction lying above the bias. The
//!   one inner bin straddling the bias is linearly interpolated; edge bins
//!   count fully on their side and half when the bias sits exactly on them.
//! - `p_right = (1 − lapse)·Σ P·w + lapse/2`, clipped to
//!   `[P_CLIP, 1 − P_CLIP]` before taking the log.
//! - [`choice_terminal_vector`] gives the per-bin likelihood of the observed
//!   choice, used as the terminal vector of the backward pass.
use crate::{
    latent::grid::LatentGrid,
    observation::errors::{ObservationError, ObservationResult},
};
use ndarray::{Array1, ArrayView1};

/// Clip applied to choice probabilities before taking the log.
pub const P_CLIP: f64 = 1e-10;

/// Decision bias and lapse rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChoiceParams {
    pub bias: f64,
    pub lapse: f64,
}

impl ChoiceParams {
    pub fn new(bias: f64, lapse: f64) -> ObservationResult<Self> {
        if !bias.is_finite() {
            return Err(ObservationError::NonFiniteBias { value: bias });
        }
        if !(lapse.is_finite() && (0.0..=1.0).contains(&lapse)) {
            return Err(ObservationError::InvalidLapse { value: lapse });
        }
        Ok(ChoiceParams { bias, lapse })
    }
}

/// Fraction of every bin lying strictly above `bias`.
pub fn choice_weights(grid: &LatentGrid, bias: f64) -> Array1<f64> {
    let n = grid.n_bins();
    let half = grid.dx / 2.0;
    Array1::from_shape_fn(n, |i| {
        let c = grid.centers[i];
        if i == 0 || i == n - 1 {
            if c > bias {
                1.0
            } else if c < bias {
                0.0
            } else {
                0.5
            }
        } else {
            ((c + half - bias) / grid.dx).clamp(0.0, 1.0)
        }
    })
}

/// Lapse-blended probability of a rightward choice, unclipped.
pub fn probability_right(p_final: ArrayView1<f64>, grid: &LatentGrid, params: &ChoiceParams) -> f64 {
    let mass_right = p_final.dot(&choice_weights(grid, params.bias));
    (1.0 - params.lapse) * mass_right + params.lapse / 2.0
}

/// Log-probability of the observed choice (`true` = right).
pub fn choice_log_likelihood(
    p_final: ArrayView1<f64>, grid: &LatentGrid, choice: bool, params: &ChoiceParams,
) -> f64 {
    let p_right = probability_right(p_final, grid, params).clamp(P_CLIP, 1.0 - P_CLIP);
    if choice { p_right.ln() } else { (1.0 - p_right).ln() }
}

/// Per-bin likelihood of the observed choice.
pub fn choice_terminal_vector(grid: &LatentGrid, choice: bool, params: &ChoiceParams) -> Array1<f64> {
    choice_weights(grid, params.bias).mapv(|w| {
        let right = (1.0 - params.lapse) * w + params.lapse / 2.0;
        if choice { right } else { 1.0 - right }
    })
}
