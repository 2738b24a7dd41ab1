//! Sensory adaptation of click magnitudes and per-bin click input.
//!
//! Purpose
//! -------
//! Turn click times into adapted magnitudes and aggregate them per time bin
//! for the propagation layer.
//!
//! Key behaviors
//! -------------
//! - The first click of a running state has magnitude `1`. Each later click
//!   recovers exponentially towards `1` from `ϕ` times the previous magnitude:
//!   `m_k = 1 + (ϕ·m_{k−1} − 1)·exp(−Δt/τ_ϕ)`.
//! - [`AdaptationMode::Within`] runs one state per stream;
//!   [`AdaptationMode::Cross`] runs a single state over the merged stream.
//!   Simultaneous clicks are merged left before right.
//! - `ϕ == 1` returns magnitudes exactly equal to `1`.
//! - [`bin_inputs`] sums magnitudes per time bin into a net input
//!   `ΣR − ΣL` and a total magnitude `ΣR + ΣL`.
use crate::latent::{
    data::{BinnedClicks, ClickTrain},
    errors::{LatentError, LatentResult, Stream},
};
use ndarray::Array1;

/// How adaptation state is shared between the two click streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdaptationMode {
    #[default]
    Within,
    Cross,
}

/// Adapted magnitudes aligned with the input click streams.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptedClicks {
    pub left: Array1<f64>,
    pub right: Array1<f64>,
}

/// Aggregated click input for one time bin.
///
/// `count == 0` marks a click-free bin whose transition is the shared
/// no-click matrix.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BinInput {
    pub net: f64,
    pub magnitude: f64,
    pub count: usize,
}

/// Adapt both click streams.
///
/// Errors
/// ------
/// - `LatentError::InvalidParam` when `ϕ < 0` or `τ_ϕ <= 0` (or non-finite).
/// - `LatentError::UnsortedClicks` when a stream has a negative inter-click
///   interval.
pub fn adapt_clicks(
    phi: f64, tau_phi: f64, clicks: &ClickTrain, mode: AdaptationMode,
) -> LatentResult<AdaptedClicks> {
    if !(phi.is_finite() && phi >= 0.0) {
        return Err(LatentError::InvalidParam {
            name: "phi",
            value: phi,
            reason: "must be finite and >= 0",
        });
    }
    if !(tau_phi.is_finite() && tau_phi > 0.0) {
        return Err(LatentError::InvalidParam {
            name: "tau_phi",
            value: tau_phi,
            reason: "must be finite and > 0",
        });
    }
    match mode {
        AdaptationMode::Within => Ok(AdaptedClicks {
            left: adapt_stream(phi, tau_phi, &clicks.left, Stream::Left)?,
            right: adapt_stream(phi, tau_phi, &clicks.right, Stream::Right)?,
        }),
        AdaptationMode::Cross => adapt_merged(phi, tau_phi, clicks),
    }
}

fn adapt_stream(
    phi: f64, tau_phi: f64, times: &Array1<f64>, stream: Stream,
) -> LatentResult<Array1<f64>> {
    check_order(times, stream)?;
    let mut out = Array1::<f64>::ones(times.len());
    if phi == 1.0 {
        return Ok(out);
    }
    for k in 1..times.len() {
        out[k] = recover(phi, tau_phi, out[k - 1], times[k] - times[k - 1]);
    }
    Ok(out)
}

fn adapt_merged(phi: f64, tau_phi: f64, clicks: &ClickTrain) -> LatentResult<AdaptedClicks> {
    check_order(&clicks.left, Stream::Left)?;
    check_order(&clicks.right, Stream::Right)?;
    let mut left = Array1::<f64>::ones(clicks.left.len());
    let mut right = Array1::<f64>::ones(clicks.right.len());
    if phi == 1.0 {
        return Ok(AdaptedClicks { left, right });
    }

    let mut events: Vec<(f64, Stream, usize)> = clicks
        .left
        .iter()
        .enumerate()
        .map(|(i, &t)| (t, Stream::Left, i))
        .chain(clicks.right.iter().enumerate().map(|(i, &t)| (t, Stream::Right, i)))
        .collect();
    // stable: ties keep left before right
    events.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut previous: Option<(f64, f64)> = None;
    for (time, stream, index) in events {
        let magnitude = match previous {
            None => 1.0,
            Some((prev_time, prev_mag)) => recover(phi, tau_phi, prev_mag, time - prev_time),
        };
        match stream {
            Stream::Left => left[index] = magnitude,
            Stream::Right => right[index] = magnitude,
        }
        previous = Some((time, magnitude));
    }
    Ok(AdaptedClicks { left, right })
}

fn recover(phi: f64, tau_phi: f64, previous: f64, interval: f64) -> f64 {
    1.0 + (phi * previous - 1.0) * (-interval / tau_phi).exp()
}

fn check_order(times: &Array1<f64>, stream: Stream) -> LatentResult<()> {
    for index in 1..times.len() {
        if times[index] < times[index - 1] {
            return Err(LatentError::UnsortedClicks {
                stream,
                index,
                time: times[index],
                previous: times[index - 1],
            });
        }
    }
    Ok(())
}

/// Sum adapted magnitudes into one [`BinInput`] per time bin.
///
/// `binned` and `adapted` must describe the same clicks (see
/// [`crate::latent::data::Trial`]).
///
/// Errors
/// ------
/// - `LatentError::ClickCountMismatch` when a stream's binned indices and
///   magnitudes differ in length.
/// - `LatentError::BinOutOfRange` for an index `>= n_time_bins`.
pub fn bin_inputs(
    adapted: &AdaptedClicks, binned: &BinnedClicks, n_time_bins: usize,
) -> LatentResult<Vec<BinInput>> {
    for (stream, bins, mags) in [
        (Stream::Left, &binned.left, &adapted.left),
        (Stream::Right, &binned.right, &adapted.right),
    ] {
        if bins.len() != mags.len() {
            return Err(LatentError::ClickCountMismatch {
                stream,
                expected: mags.len(),
                found: bins.len(),
            });
        }
    }
    binned.check(n_time_bins)?;

    let mut inputs = vec![BinInput::default(); n_time_bins];
    let signed = binned
        .left
        .iter()
        .zip(adapted.left.iter().map(|m| -m))
        .chain(binned.right.iter().zip(adapted.right.iter().copied()));
    for (&bin, m) in signed {
        let slot = &mut inputs[bin];
        slot.net += m;
        slot.magnitude += m.abs();
        slot.count += 1;
    }
    Ok(inputs)
}
