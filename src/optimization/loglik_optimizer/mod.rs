//! loglik_optimizer — MLE-friendly, argmin-powered log-likelihood optimizer.
//!
//! Purpose
//! -------
//! Provide the opaque "maximize this log-likelihood" service used to fit the
//! accumulator model. Callers implement [`LogLikelihood`] and invoke
//! [`maximize`] to run L-BFGS with a configurable line search, tolerances,
//! and finite-difference fallbacks.
//!
//! Key behaviors
//! -------------
//! - Convert `ℓ(θ)` into an Argmin cost `c(θ) = -ℓ(θ)` via
//!   [`adapter::ArgMinAdapter`].
//! - Validate the start point, build the solver ([`builders`]), run it
//!   ([`run::run_solver`]) and normalize the result into an [`OptimOutcome`].
//! - Provide guarded finite differences ([`finite_diff`]) for gradients and
//!   Hessians when analytic derivatives are missing.
//!
//! Invariants & assumptions
//! ------------------------
//! - The optimizer **always maximizes** `ℓ(θ)`; user code never implements
//!   the cost directly.
//! - [`LogLikelihood::value`] must report invalid inputs as `OptError`
//!   values, not panics.
//! - `θ` lives in an unconstrained space; any mapping into bounded model
//!   parameters happens in the model layer.
//!
//! Testing notes
//! -------------
//! - Unit tests in submodules cover sign conventions, solver construction,
//!   finite-difference fallbacks, validation, and convergence reporting.
//! - `api` tests run `maximize` end to end on a concave toy objective.

pub mod adapter;
pub mod api;
pub mod builders;
pub mod finite_diff;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::maximize;
pub use self::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Hessian, Theta};

pub mod prelude {
    pub use super::api::maximize;
    pub use super::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
