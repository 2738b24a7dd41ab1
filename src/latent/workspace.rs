//! Per-trial scratch buffers for propagation.
//!
//! Purpose
//! -------
//! Hold every buffer a forward or backward pass writes to, so that a pass
//! over one trial performs no per-bin allocation; the grid supplies its
//! cached bin edges to each click-bin transition.
//!
//! Invariants & assumptions
//! ------------------------
//! - All vectors have length `n` and `f` is `n × n`, where `n` is the grid's
//!   bin count. [`TrialWorkspace::check`] enforces this before a pass starts.
//! - A workspace is borrowed mutably for the whole pass over one trial and is
//!   never shared between trials running concurrently. Parallel callers keep
//!   one workspace per worker (see `models::likelihood`).
//! - `p` and `scratch` are swapped after each step: the matrix–vector product
//!   reads `p` and writes `scratch`, so the source and destination never
//!   alias.
//! - Contents between passes are unspecified; every pass starts by
//!   overwriting `p` with the initial distribution.
use crate::latent::errors::{LatentError, LatentResult};
use ndarray::{Array1, Array2};

#[derive(Debug, Clone)]
pub struct TrialWorkspace {
    /// Current (filtered) distribution over bins.
    pub p: Array1<f64>,
    /// Destination of the next matrix–vector product.
    pub scratch: Array1<f64>,
    /// Per-bin transition matrix for bins carrying clicks.
    pub f: Array2<f64>,
    /// Emission-weighted backward message.
    pub weighted: Array1<f64>,
}

impl TrialWorkspace {
    pub fn new(n_bins: usize) -> Self {
        TrialWorkspace {
            p: Array1::zeros(n_bins),
            scratch: Array1::zeros(n_bins),
            f: Array2::zeros((n_bins, n_bins)),
            weighted: Array1::zeros(n_bins),
        }
    }

    pub fn n_bins(&self) -> usize {
        self.p.len()
    }

    /// Verify every buffer matches a grid of `n_bins` bins.
    pub fn check(&self, n_bins: usize) -> LatentResult<()> {
        let consistent = self.p.len() == n_bins
            && self.scratch.len() == n_bins
            && self.weighted.len() == n_bins
            && self.f.dim() == (n_bins, n_bins);
        if !consistent {
            return Err(LatentError::BufferSizeMismatch { expected: n_bins, found: self.p.len() });
        }
        Ok(())
    }
}
