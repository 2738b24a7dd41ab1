//! Latent block of the parameter vector.
//!
//! Purpose
//! -------
//! Hold the seven accumulator parameters θz in named form and convert them
//! to and from their slot in the flat optimization vector.
//!
//! Conventions
//! -----------
//! - Flat order is `(σ²_i, B, λ, σ²_a, σ²_s, ϕ, τ_ϕ)`, see [`LATENT_NAMES`].
//! - Variances are in units of the latent variable squared; `σ²_a` is per
//!   second, `σ²_s` per unit click magnitude. `λ` and `τ_ϕ` are in 1/s and s.
use crate::latent::errors::{LatentError, LatentResult};
use ndarray::{Array1, ArrayView1};

/// Number of latent parameters in the flat vector.
pub const N_LATENT: usize = 7;

/// Names of the latent parameters, in flat-vector order.
pub const LATENT_NAMES: [&str; N_LATENT] =
    ["sigma2_i", "bound", "lambda", "sigma2_a", "sigma2_s", "phi", "tau_phi"];

/// `LatentParams` — validated accumulator parameters θz.
///
/// Fields
/// ------
/// - `sigma2_i`: initial-point variance, `>= 0`.
/// - `bound`: absorbing bound `B`, `> 0`.
/// - `lambda`: leak (< 0) or instability (> 0) rate, finite.
/// - `sigma2_a`: accumulation noise variance per second, `>= 0`.
/// - `sigma2_s`: per-click noise variance, `>= 0`.
/// - `phi`: adaptation magnitude, `>= 0` (`1` disables adaptation).
/// - `tau_phi`: adaptation recovery time constant, `> 0`.
///
/// Invariants
/// ----------
/// - Every field is finite and within the ranges above; enforced by
///   [`LatentParams::new`] and [`LatentParams::from_view`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatentParams {
    pub sigma2_i: f64,
    pub bound: f64,
    pub lambda: f64,
    pub sigma2_a: f64,
    pub sigma2_s: f64,
    pub phi: f64,
    pub tau_phi: f64,
}

impl LatentParams {
    /// Construct and validate θz.
    ///
    /// # Errors
    /// - `LatentError::InvalidParam` naming the first offending field.
    pub fn new(
        sigma2_i: f64, bound: f64, lambda: f64, sigma2_a: f64, sigma2_s: f64, phi: f64,
        tau_phi: f64,
    ) -> LatentResult<Self> {
        let params = LatentParams { sigma2_i, bound, lambda, sigma2_a, sigma2_s, phi, tau_phi };
        params.validate()?;
        Ok(params)
    }

    /// Read θz from the first [`N_LATENT`] entries of `view`.
    pub fn from_view(view: ArrayView1<f64>) -> LatentResult<Self> {
        if view.len() < N_LATENT {
            return Err(LatentError::ParamLengthMismatch { expected: N_LATENT, actual: view.len() });
        }
        LatentParams::new(view[0], view[1], view[2], view[3], view[4], view[5], view[6])
    }

    pub fn to_array(&self) -> Array1<f64> {
        Array1::from(vec![
            self.sigma2_i,
            self.bound,
            self.lambda,
            self.sigma2_a,
            self.sigma2_s,
            self.phi,
            self.tau_phi,
        ])
    }

    fn validate(&self) -> LatentResult<()> {
        non_negative("sigma2_i", self.sigma2_i)?;
        if !(self.bound.is_finite() && self.bound > 0.0) {
            return Err(LatentError::InvalidBound { value: self.bound });
        }
        if !self.lambda.is_finite() {
            return Err(LatentError::InvalidParam {
                name: "lambda",
                value: self.lambda,
                reason: "must be finite",
            });
        }
        non_negative("sigma2_a", self.sigma2_a)?;
        non_negative("sigma2_s", self.sigma2_s)?;
        non_negative("phi", self.phi)?;
        if !(self.tau_phi.is_finite() && self.tau_phi > 0.0) {
            return Err(LatentError::InvalidParam {
                name: "tau_phi",
                value: self.tau_phi,
                reason: "must be finite and > 0",
            });
        }
        Ok(())
    }
}

fn non_negative(name: &'static str, value: f64) -> LatentResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(LatentError::InvalidParam { name, value, reason: "must be finite and >= 0" })
    }
}
