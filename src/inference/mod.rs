//! inference — uncertainty for fitted accumulator models.
//!
//! Purpose
//! -------
//! Post-fit intervals for the free parameters of an
//! [`AccumulatorModel`](crate::models::AccumulatorModel), in natural units.
//!
//! Key behaviors
//! -------------
//! - [`hessian_intervals`]: Wald intervals from the finite-difference
//!   observed information, with non-positive-definite directions dropped and
//!   the affected parameters flagged.
//! - [`likelihood_ratio_intervals`]: intervals where the likelihood slice
//!   drops by a χ²₁ threshold, located with [`find_sign_change_roots`].
//!
//! Conventions
//! -----------
//! - Failures are reported through [`InferenceResult`]; `warn!` events mark
//!   unreliable Hessians and non-unimodal slices.

pub mod errors;
pub mod hessian;
pub mod profile;

pub use self::errors::{InferenceError, InferenceResult};
pub use self::hessian::{HessianIntervals, WALD_LEVEL, hessian_intervals};
pub use self::profile::{
    CIOptions, LR_THRESHOLD, ProfileInterval, ProfileShape, find_sign_change_roots,
    likelihood_ratio_intervals,
};

pub mod prelude {
    pub use super::errors::{InferenceError, InferenceResult};
    pub use super::hessian::{HessianIntervals, hessian_intervals};
    pub use super::profile::{CIOptions, ProfileShape, likelihood_ratio_intervals};
}
