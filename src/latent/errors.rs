//! Errors for the latent accumulator engine (grid construction, click
//! adaptation, transition matrices, propagation, and trial data validation).
//!
//! ## Conventions
//! - **Indices are 0-based**: click indices count within their stream, time
//!   bins count from the first bin after trial onset.
//! - Invalid configuration is reported before any trial is processed.
//! - Numerical degeneracy inside a forward pass is reported as
//!   [`LatentError::DegenerateNormalizer`] with the offending time bin; the
//!   model layer attaches the trial coordinates.
use thiserror::Error;

pub type LatentResult<T> = Result<T, LatentError>;

/// Which click stream an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Left,
    Right,
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stream::Left => write!(f, "left"),
            Stream::Right => write!(f, "right"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LatentError {
    // ---- Grid ----
    #[error("Bin count must be odd and >= 3; got {n}")]
    InvalidBinCount { n: usize },

    #[error("Bound must be finite and > 0; got {value}")]
    InvalidBound { value: f64 },

    #[error("Time step must be finite and > 0; got {dt}")]
    InvalidTimeStep { dt: f64 },

    // ---- Parameters ----
    #[error("Latent parameter '{name}' is invalid ({value}): {reason}")]
    InvalidParam { name: &'static str, value: f64, reason: &'static str },

    #[error("Latent parameter vector must have length {expected}; got {actual}")]
    ParamLengthMismatch { expected: usize, actual: usize },

    // ---- Clicks ----
    #[error("Click {index} of the {stream} stream is not finite and >= 0: {value}")]
    InvalidClickTime { stream: Stream, index: usize, value: f64 },

    #[error(
        "Clicks of the {stream} stream are not ordered: click {index} at {time} precedes the previous click at {previous}"
    )]
    UnsortedClicks { stream: Stream, index: usize, time: f64, previous: f64 },

    #[error("Click {index} of the {stream} stream at {time}s falls after the trial end ({duration}s)")]
    ClickOutsideTrial { stream: Stream, index: usize, time: f64, duration: f64 },

    #[error("Click {index} of the {stream} stream is binned at {bin}, trial has {n_time_bins} bins")]
    BinOutOfRange { stream: Stream, index: usize, bin: usize, n_time_bins: usize },

    #[error("The {stream} stream has {found} binned clicks but {expected} click magnitudes")]
    ClickCountMismatch { stream: Stream, expected: usize, found: usize },

    // ---- Trial data ----
    #[error("Trial must span at least one time bin")]
    EmptyTrial,

    #[error("Spike count matrix must be {expected:?} (time bins x neurons); got {found:?}")]
    SpikeShapeMismatch { expected: (usize, usize), found: (usize, usize) },

    #[error("Trials in one set must share a neuron count; expected {expected}, got {found}")]
    NeuronCountMismatch { expected: usize, found: usize },

    #[error("Trial was binned at dt = {found}, dataset uses dt = {expected}")]
    TimeStepMismatch { expected: f64, found: f64 },

    #[error("Initial offset must be finite; got {value}")]
    InvalidInitialOffset { value: f64 },

    // ---- Propagation ----
    #[error("Buffer has {found} entries per side, grid has {expected} bins")]
    BufferSizeMismatch { expected: usize, found: usize },

    #[error("Emission matrix has {found} rows, trial has {expected} time bins")]
    EmissionLengthMismatch { expected: usize, found: usize },

    #[error("Filtered record must be {expected:?} (time bins x grid bins); got {found:?}")]
    RecordShapeMismatch { expected: (usize, usize), found: (usize, usize) },

    #[error("Probability mass vanished at time bin {bin} (normalizer {value})")]
    DegenerateNormalizer { bin: usize, value: f64 },
}
