//! latent — the bounded accumulator on a discretized state space.
//!
//! Purpose
//! -------
//! Represent the latent decision variable as a probability vector over a
//! fixed grid and move it through a trial one time bin at a time.
//!
//! Key behaviors
//! -------------
//! - [`grid`] builds bin centres with absorbing edges at `±B`.
//! - [`clicks`] adapts click magnitudes and aggregates them per bin.
//! - [`transition`] builds column-stochastic one-step matrices.
//! - [`propagation`] runs forward filtering, backward smoothing, and
//!   posterior computation over [`workspace::TrialWorkspace`] buffers.
//! - [`data`] and [`params`] hold validated trial data and parameters θz.
//!
//! Conventions
//! -----------
//! - Probability vectors are indexed by bin, `0` at `−B`.
//! - Transition matrices act on column vectors: `P_{t+1} = F · P_t`.
//! - All errors are [`errors::LatentError`]; nothing in this layer panics on
//!   invalid input or logs.

pub mod clicks;
pub mod data;
pub mod errors;
pub mod grid;
pub mod params;
pub mod propagation;
pub mod transition;
pub mod workspace;

pub use self::clicks::{AdaptationMode, AdaptedClicks, BinInput, adapt_clicks, bin_inputs};
pub use self::data::{ClickTrain, Dataset, Trial, TrialSet};
pub use self::errors::{LatentError, LatentResult};
pub use self::grid::LatentGrid;
pub use self::params::{LATENT_NAMES, LatentParams, N_LATENT};
pub use self::propagation::{ForwardOutcome, Propagator};
pub use self::workspace::TrialWorkspace;
