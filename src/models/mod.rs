//! models — parameter layout, likelihood aggregation, fitting, simulation.
//!
//! Purpose
//! -------
//! Tie the latent engine and the observation adapters into a model over one
//! flat parameter vector that the optimizer can maximize.
//!
//! Key behaviors
//! -------------
//! - [`layout`] maps the flat vector to latent and observation parameters
//!   and holds the bound table and free/fixed mask.
//! - [`likelihood`] sums per-trial log-likelihoods in parallel and exposes
//!   [`AccumulatorModel`] to the optimizer.
//! - [`fit`] runs maximum-likelihood fitting with diagnostics.
//! - [`simulate`] generates synthetic datasets from known parameters.

pub mod errors;
pub mod fit;
pub mod layout;
pub mod likelihood;
pub mod options;
pub mod simulate;

pub use self::errors::{ModelError, ModelResult};
pub use self::fit::{FitOutcome, FitQuality, ParameterSet, initial_neuron_params};
pub use self::layout::{
    ParamLayout, ParamSpec, combine_parameters, observation_vector, split_parameters,
};
pub use self::likelihood::{
    AccumulatorModel, total_log_likelihood, trial_log_likelihood, trial_log_likelihoods,
    trial_posterior,
};
pub use self::options::{DEFAULT_DT, DEFAULT_N_BINS, GaussianPrior, ModelOptions};
pub use self::simulate::{SimOptions, simulate_dataset};
