//! observation — choice and spike-count likelihoods given the latent state.
//!
//! Purpose
//! -------
//! Turn the latent distribution into data likelihoods: a choice readout on
//! the final distribution and Poisson spike-count emissions per time bin.
//!
//! Key behaviors
//! -------------
//! - [`choice`] computes `ln p(choice | P_final)` with bias and lapse, and
//!   the per-bin terminal vector used for posteriors.
//! - [`spikes`] builds `(T × bins)` log-emission matrices from spike counts.
//! - [`links`] holds the closed set of firing-rate link functions.
//! - [`ObservationParams`] bundles the observation block of θ.

pub mod choice;
pub mod errors;
pub mod links;
pub mod spikes;

pub use self::choice::{
    ChoiceParams, choice_log_likelihood, choice_terminal_vector, choice_weights,
    probability_right,
};
pub use self::errors::{ObservationError, ObservationResult};
pub use self::links::{LinkFunction, NeuronParams};
pub use self::spikes::{emission_log_matrix, poisson_log_likelihood, rate_table};

/// Observation block of the parameter vector.
///
/// `neurons[s]` lists the neurons of trial set `s` in column order of that
/// set's spike matrices. `choice` is `None` when choices are not modelled.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationParams {
    pub choice: Option<ChoiceParams>,
    pub neurons: Vec<Vec<NeuronParams>>,
}

impl ObservationParams {
    pub fn n_neurons(&self) -> usize {
        self.neurons.iter().map(Vec::len).sum()
    }
}
