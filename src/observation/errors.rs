//! Errors for the choice and spike observation adapters.
use thiserror::Error;

pub type ObservationResult<T> = Result<T, ObservationError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObservationError {
    // ---- Choice ----
    #[error("Lapse rate must lie in [0, 1]; got {value}")]
    InvalidLapse { value: f64 },

    #[error("Choice bias must be finite; got {value}")]
    NonFiniteBias { value: f64 },

    // ---- Link functions ----
    #[error("Unknown link function '{name}' (expected softplus, sigmoid or exponential)")]
    UnknownLink { name: String },

    #[error("Link '{link}' takes {expected} parameters; got {found}")]
    LinkParamCount { link: &'static str, expected: usize, found: usize },

    #[error("Link parameter {index} must be finite; got {value}")]
    NonFiniteLinkParam { index: usize, value: f64 },

    #[error("Cannot initialize link parameters: {reason}")]
    Initialization { reason: &'static str },

    // ---- Spikes ----
    #[error("Expected {expected} neurons; got {found}")]
    NeuronCountMismatch { expected: usize, found: usize },

    #[error("Time step must be finite and > 0; got {dt}")]
    InvalidTimeStep { dt: f64 },
}
