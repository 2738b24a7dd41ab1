//! Discretized accumulator state space.
//!
//! Purpose
//! -------
//! Build the bin centres on which the accumulator distribution lives. The
//! two outermost bins sit exactly on the bounds `±B` and are absorbing; the
//! `n − 2` inner bins tile `[−B, B]` with width `dx = 2B / (n − 2)`.
//!
//! Invariants & assumptions
//! ------------------------
//! - `n` is odd and `n >= 3`, so the grid is symmetric about a centre bin at
//!   exactly `0`.
//! - `B` is finite and strictly positive.
//! - Centres are strictly increasing; `centers[0] == −B`,
//!   `centers[n − 1] == B`.
//! - Inner centre `k` (0-based from the left inner bin) sits at
//!   `(k − (n − 3)/2) · dx`, and its bin spans `centre ± dx/2`. The outermost
//!   inner bins therefore end exactly at `±B`.
//!
//! Conventions
//! -----------
//! - Bin edges between consecutive bins are exposed by [`LatentGrid::edges`]:
//!   `n − 1` values from `−B` to `B`. Mass below the first edge belongs to
//!   bin `0`, mass above the last edge belongs to bin `n − 1`.
use crate::latent::errors::{LatentError, LatentResult};
use ndarray::Array1;

/// `LatentGrid` — bin centres and width for one bound `B` and bin count `n`.
///
/// Fields
/// ------
/// - `centers`: `Array1<f64>` of length `n`, strictly increasing.
/// - `dx`: inner bin width `2B / (n − 2)`.
/// - `bound`: the absorbing bound `B`.
///
/// The `n − 1` bin edges are computed once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct LatentGrid {
    pub centers: Array1<f64>,
    pub dx: f64,
    pub bound: f64,
    edges: Array1<f64>,
}

impl LatentGrid {
    /// Build the grid for bound `bound` and `n_bins` bins.
    ///
    /// Errors
    /// ------
    /// - `LatentError::InvalidBinCount` when `n_bins` is even or below 3.
    /// - `LatentError::InvalidBound` when `bound` is not finite and positive.
    pub fn new(bound: f64, n_bins: usize) -> LatentResult<Self> {
        validate_bin_count(n_bins)?;
        if !(bound.is_finite() && bound > 0.0) {
            return Err(LatentError::InvalidBound { value: bound });
        }
        let dx = 2.0 * bound / (n_bins - 2) as f64;
        let half_inner = ((n_bins - 3) / 2) as f64;
        let mut centers = Array1::<f64>::zeros(n_bins);
        centers[0] = -bound;
        centers[n_bins - 1] = bound;
        for i in 1..n_bins - 1 {
            centers[i] = ((i - 1) as f64 - half_inner) * dx;
        }
        let n_edges = n_bins - 1;
        let mut edges = Array1::from_shape_fn(n_edges, |k| -bound + k as f64 * dx);
        edges[n_edges - 1] = bound;
        Ok(LatentGrid { centers, dx, bound, edges })
    }

    pub fn n_bins(&self) -> usize {
        self.centers.len()
    }

    /// Index of the centre bin (value `0`).
    pub fn center_index(&self) -> usize {
        self.centers.len() / 2
    }

    /// Edges between consecutive bins, `n − 1` values from `−B` to `B`.
    ///
    /// Edge `k` separates bin `k` from bin `k + 1`. The last edge is pinned to
    /// `B` exactly so that the upper tail maps onto the absorbing bin without
    /// accumulated rounding.
    pub fn edges(&self) -> &Array1<f64> {
        &self.edges
    }
}

pub(crate) fn validate_bin_count(n_bins: usize) -> LatentResult<()> {
    if n_bins < 3 || n_bins % 2 == 0 {
        return Err(LatentError::InvalidBinCount { n: n_bins });
    }
    Ok(())
}
