//! numerical_stability — guarded transforms shared by the model and optimizer.
//!
//! Purpose
//! -------
//! Collect the stable nonlinear maps used to keep parameters inside their
//! admissible region while the optimizer works in an unconstrained space,
//! together with the numeric floors used by the inference layer.
//!
//! Conventions
//! -----------
//! - Free parameters are optimized as unconstrained coordinates `u` and
//!   mapped into `(lb, ub)` by [`to_bounded`]; [`from_bounded`] is its
//!   clamped inverse.
//! - Link functions in the spike model use [`safe_softplus`] and
//!   [`safe_logistic`] so that rates never overflow.

pub mod transformations;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::transformations::{
    EIGEN_EPS, LOGIT_EPS, from_bounded, safe_logistic, safe_logit, safe_softplus,
    safe_softplus_inv, to_bounded,
};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use pulse_ddm::optimization::numerical_stability::prelude::*;
//
// to import the main numerical-stability surface in a single line.

pub mod prelude {
    pub use super::transformations::{
        EIGEN_EPS, LOGIT_EPS, from_bounded, safe_logistic, safe_logit, safe_softplus,
        safe_softplus_inv, to_bounded,
    };
}
