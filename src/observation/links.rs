//! Firing-rate link functions for the spike observation model.
//!
//! Purpose
//! -------
//! Map the latent accumulator value `x` to a neuron's firing rate in Hz
//! through a small closed family of monotone links, selected once at
//! configuration time.
//!
//! Key behaviors
//! -------------
//! - [`LinkFunction::Softplus`]: `p1 + softplus(p2·x + p3)` (3 parameters).
//! - [`LinkFunction::Sigmoid`]: `a + b·σ(c·x + d)` (4 parameters).
//! - [`LinkFunction::Exponential`]: `exp(a + b·x)` (2 parameters).
//! - [`LinkFunction::initialize`] derives starting values from data by
//!   matching the mean rate and the least-squares slope of rate against a
//!   latent proxy.
//!
//! Conventions
//! -----------
//! - Rates may come out non-positive for some parameter values; the Poisson
//!   adapter floors them.
//! - Parameters are stored as a plain `Vec<f64>` in the link's order so they
//!   slot directly into the flat optimization vector.
use crate::{
    observation::errors::{ObservationError, ObservationResult},
    optimization::numerical_stability::transformations::{
        safe_logistic, safe_softplus, safe_softplus_inv,
    },
};
use std::str::FromStr;

/// Smallest mean rate used when initializing a link from data, in Hz.
const MIN_INIT_RATE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFunction {
    Softplus,
    Sigmoid,
    Exponential,
}

impl LinkFunction {
    pub fn name(&self) -> &'static str {
        match self {
            LinkFunction::Softplus => "softplus",
            LinkFunction::Sigmoid => "sigmoid",
            LinkFunction::Exponential => "exponential",
        }
    }

    pub fn n_params(&self) -> usize {
        match self {
            LinkFunction::Softplus => 3,
            LinkFunction::Sigmoid => 4,
            LinkFunction::Exponential => 2,
        }
    }

    /// Firing rate at latent value `x`.
    ///
    /// Errors
    /// ------
    /// - `ObservationError::LinkParamCount` when `params.len()` differs from
    ///   [`LinkFunction::n_params`].
    pub fn evaluate(&self, params: &[f64], x: f64) -> ObservationResult<f64> {
        match (self, params) {
            (LinkFunction::Softplus, &[base, gain, offset]) => Ok(base + safe_softplus(gain * x + offset)),
            (LinkFunction::Sigmoid, &[base, amplitude, gain, offset]) => {
                Ok(base + amplitude * safe_logistic(gain * x + offset))
            }
            (LinkFunction::Exponential, &[offset, gain]) => Ok((offset + gain * x).exp()),
            _ => Err(ObservationError::LinkParamCount {
                link: self.name(),
                expected: self.n_params(),
                found: params.len(),
            }),
        }
    }

    /// Default `(lower, upper)` bounds for each parameter.
    pub fn default_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        match self {
            LinkFunction::Softplus => (vec![-100.0, -50.0, -50.0], vec![100.0, 50.0, 50.0]),
            LinkFunction::Sigmoid => {
                (vec![-100.0, 0.0, -50.0, -50.0], vec![100.0, 200.0, 50.0, 50.0])
            }
            LinkFunction::Exponential => (vec![-10.0, -5.0], vec![10.0, 5.0]),
        }
    }

    /// Starting parameters from pooled spike counts.
    ///
    /// Parameters
    /// ----------
    /// - `counts`: spike counts per time bin, pooled over trials.
    /// - `proxy`: latent proxy per bin (e.g. the running click difference),
    ///   aligned with `counts`.
    /// - `dt`: bin width in seconds.
    ///
    /// The returned parameters reproduce the mean rate `r̄` at the mean proxy
    /// value `x̄` with slope equal to the least-squares slope of `count/dt`
    /// against the proxy.
    ///
    /// Errors
    /// ------
    /// - `ObservationError::Initialization` for empty or misaligned input.
    /// - `ObservationError::InvalidTimeStep` for a non-positive `dt`.
    pub fn initialize(&self, counts: &[f64], proxy: &[f64], dt: f64) -> ObservationResult<Vec<f64>> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ObservationError::InvalidTimeStep { dt });
        }
        if counts.is_empty() {
            return Err(ObservationError::Initialization { reason: "no spike counts" });
        }
        if counts.len() != proxy.len() {
            return Err(ObservationError::Initialization {
                reason: "counts and latent proxy differ in length",
            });
        }

        let m = counts.len() as f64;
        let x_bar = proxy.iter().sum::<f64>() / m;
        let r_bar = counts.iter().map(|k| k / dt).sum::<f64>() / m;
        let mut sxy = 0.0;
        let mut sxx = 0.0;
        for (&k, &x) in counts.iter().zip(proxy) {
            sxy += (x - x_bar) * (k / dt - r_bar);
            sxx += (x - x_bar) * (x - x_bar);
        }
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        let r_bar = r_bar.max(MIN_INIT_RATE);
        if !(r_bar.is_finite() && slope.is_finite() && x_bar.is_finite()) {
            return Err(ObservationError::Initialization { reason: "non-finite moments" });
        }

        let params = match self {
            LinkFunction::Softplus => {
                let z = safe_softplus_inv(r_bar);
                let gain = slope / safe_logistic(z);
                vec![0.0, gain, z - gain * x_bar]
            }
            LinkFunction::Sigmoid => {
                let amplitude = 2.0 * r_bar;
                let gain = 4.0 * slope / amplitude;
                vec![0.0, amplitude, gain, -gain * x_bar]
            }
            LinkFunction::Exponential => {
                let gain = slope / r_bar;
                vec![r_bar.ln() - gain * x_bar, gain]
            }
        };
        Ok(params)
    }
}

impl FromStr for LinkFunction {
    type Err = ObservationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "softplus" => Ok(LinkFunction::Softplus),
            "sigmoid" | "sig" => Ok(LinkFunction::Sigmoid),
            "exponential" | "exp" => Ok(LinkFunction::Exponential),
            _ => Err(ObservationError::UnknownLink { name: s.to_string() }),
        }
    }
}

/// One neuron's link and its parameters.
///
/// Fields are private so `values` always has the length `link` expects.
#[derive(Debug, Clone, PartialEq)]
pub struct NeuronParams {
    link: LinkFunction,
    values: Vec<f64>,
}

impl NeuronParams {
    /// Errors
    /// ------
    /// - `ObservationError::LinkParamCount` when `values` has the wrong length.
    /// - `ObservationError::NonFiniteLinkParam` for a non-finite entry.
    pub fn new(link: LinkFunction, values: Vec<f64>) -> ObservationResult<Self> {
        if values.len() != link.n_params() {
            return Err(ObservationError::LinkParamCount {
                link: link.name(),
                expected: link.n_params(),
                found: values.len(),
            });
        }
        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ObservationError::NonFiniteLinkParam { index, value });
        }
        Ok(NeuronParams { link, values })
    }

    pub fn link(&self) -> LinkFunction {
        self.link
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Firing rate at `x`.
    pub fn rate(&self, x: f64) -> f64 {
        // length checked in `new`
        self.link.evaluate(&self.values, x).unwrap_or(f64::NAN)
    }
}
