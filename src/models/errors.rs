//! Errors for the model layer: parameter layout, bounds, likelihood
//! aggregation, fitting, and simulation.
//!
//! ## Conventions
//! - Trial coordinates are 0-based: `set` indexes `Dataset::sets`, `trial`
//!   indexes `TrialSet::trials`, `bin` is the time bin inside the trial.
//! - Errors from the latent and observation layers are wrapped, not
//!   flattened; a numerical collapse inside one trial is surfaced as
//!   [`ModelError::DegenerateTrial`] so callers can locate it.
use crate::{latent::errors::LatentError, observation::errors::ObservationError};
use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    // ---- Wrapped layers ----
    #[error(transparent)]
    Latent(#[from] LatentError),

    #[error(transparent)]
    Observation(#[from] ObservationError),

    #[error("Trial {trial} of set {set}: {source}")]
    TrialData { set: usize, trial: usize, source: LatentError },

    // ---- Likelihood ----
    #[error("Trial {trial} of set {set} lost all probability mass at time bin {bin}")]
    DegenerateTrial { set: usize, trial: usize, bin: usize },

    #[error("Trial {trial} of set {set} has no recorded choice but choices are modelled")]
    MissingChoice { set: usize, trial: usize },

    #[error("Choice parameters are required when choices are modelled")]
    MissingChoiceParams,

    #[error("Set {set} records {found} neurons but the layout describes {expected}")]
    NeuronLayoutMismatch { set: usize, expected: usize, found: usize },

    #[error("No trial {trial} in set {set}")]
    TrialOutOfRange { set: usize, trial: usize },

    #[error("Dataset has {found} trial sets but the layout describes {expected}")]
    SetCountMismatch { expected: usize, found: usize },

    // ---- Parameter vector ----
    #[error("Parameter vector must have length {expected}; got {actual}")]
    ThetaLengthMismatch { expected: usize, actual: usize },

    #[error("Parameter {index} must be finite; got {value}")]
    NonFiniteTheta { index: usize, value: f64 },

    #[error("Bounds for parameter {index} must satisfy lower < upper; got [{lower}, {upper}]")]
    InvalidBounds { index: usize, lower: f64, upper: f64 },

    #[error("Parameter {index} = {value} lies outside its bounds [{lower}, {upper}]")]
    OutsideBounds { index: usize, value: f64, lower: f64, upper: f64 },

    #[error("No free parameters to fit")]
    NoFreeParameters,

    // ---- Configuration ----
    #[error("Invalid model options: {reason}")]
    InvalidOptions { reason: &'static str },

    #[error("Prior must cover {expected} observation parameters; got {found}")]
    PriorLengthMismatch { expected: usize, found: usize },

    #[error("Prior entry {index} is invalid: {reason}")]
    InvalidPrior { index: usize, reason: &'static str },

    // ---- Simulation ----
    #[error("Simulation failed: {reason}")]
    Simulation { reason: String },
}

impl ModelError {
    /// Attach trial coordinates to a latent-layer failure.
    ///
    /// A vanished normalizer becomes [`ModelError::DegenerateTrial`]; other
    /// latent errors become [`ModelError::TrialData`]. Everything else is
    /// returned unchanged.
    pub fn at_trial(self, set: usize, trial: usize) -> ModelError {
        match self {
            ModelError::Latent(LatentError::DegenerateNormalizer { bin, .. }) => {
                ModelError::DegenerateTrial { set, trial, bin }
            }
            ModelError::Latent(source) => ModelError::TrialData { set, trial, source },
            other => other,
        }
    }
}
