//! Unified error handling for post-fit inference.
//!
//! `InferenceError` covers Hessian-based and likelihood-ratio intervals:
//! invalid configuration, model evaluation failures, derivative failures and
//! root-solver failures reported through `argmin`'s `anyhow` error type.
use crate::{models::errors::ModelError, optimization::errors::OptError};
use thiserror::Error;

pub type InferenceResult<T> = Result<T, InferenceError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    // ---- Wrapped layers ----
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Optimization(#[from] OptError),

    // ---- Inputs ----
    #[error("Estimate must have length {expected}; got {actual}")]
    EstimateLengthMismatch { expected: usize, actual: usize },

    #[error("No free parameters to build intervals for")]
    NoFreeParameters,

    #[error("Invalid interval options: {reason}")]
    InvalidOptions { reason: &'static str },

    #[error("Root search interval [{lo}, {hi}] needs lo < hi and at least 2 grid points")]
    InvalidSearchInterval { lo: f64, hi: f64 },

    // ---- Numerics ----
    #[error("Could not evaluate the normal quantile: {reason}")]
    Quantile { reason: String },

    // ---- Anyhow catchall ----
    #[error("Inference Error: {0}")]
    Anyhow(String),
}

impl From<anyhow::Error> for InferenceError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<InferenceError>() {
            Ok(inner) => inner,
            Err(other) => InferenceError::Anyhow(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Errors raised inside an argmin problem come back as themselves.
    //
    // Given
    // -----
    // - An `InferenceError` wrapped into `anyhow::Error`, and a plain
    //   `anyhow` message.
    //
    // Expect
    // ------
    // - The first downcasts to the original variant; the second becomes
    //   `Anyhow`.
    fn anyhow_round_trip_preserves_variant() {
        let wrapped = anyhow::Error::new(InferenceError::NoFreeParameters);
        let plain = anyhow::anyhow!("solver exploded");

        assert_eq!(InferenceError::from(wrapped), InferenceError::NoFreeParameters);
        assert_eq!(
            InferenceError::from(plain),
            InferenceError::Anyhow("solver exploded".to_string())
        );
    }
}
