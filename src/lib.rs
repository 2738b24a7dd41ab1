//! pulse_ddm — maximum-likelihood fitting of click-driven bounded
//! accumulators to choices and spike counts.
//!
//! Purpose
//! -------
//! Model a decision variable that integrates left and right sensory clicks
//! with adaptation, leak and noise between absorbing bounds, observed
//! through a final choice and/or Poisson spike counts, and fit its
//! parameters by maximizing the exact likelihood of a discretized
//! Markov-chain approximation.
//!
//! Key behaviors
//! -------------
//! - [`latent`]: grid, click adaptation, transition matrices and the
//!   forward/backward propagation engine.
//! - [`observation`]: choice readout, spike-count emissions and firing-rate
//!   link functions.
//! - [`models`]: flat parameter layout with bounds and masks, parallel
//!   likelihood aggregation, fitting and simulation.
//! - [`optimization`]: the `argmin`-backed L-BFGS maximizer and numerically
//!   stable transforms.
//! - [`inference`]: Hessian-based and likelihood-ratio intervals.
//!
//! Invariants & assumptions
//! ------------------------
//! - Probability vectors are column vectors; transition matrices are
//!   column-stochastic with absorbing edge columns.
//! - Per-trial log-likelihoods are collected in trial order and summed
//!   sequentially, so totals are reproducible bit for bit.
//!
//! Conventions
//! -----------
//! - Times are in seconds, rates in Hz.
//! - Every fallible routine returns its layer's typed error; nothing panics
//!   on invalid input.
//! - The library emits `tracing` events and never installs a subscriber.
//!
//! Downstream usage
//! ----------------
//! ```no_run
//! use pulse_ddm::{
//!     latent::LatentParams,
//!     models::{AccumulatorModel, ModelOptions, ParamLayout, ParamSpec, ParameterSet, SimOptions,
//!              simulate_dataset},
//!     observation::{ChoiceParams, ObservationParams},
//!     optimization::loglik_optimizer::MLEOptions,
//! };
//!
//! let latent = LatentParams::new(1e-3, 18.0, -0.5, 5.0, 1.5, 0.4, 0.02)?;
//! let obs = ObservationParams { choice: Some(ChoiceParams::new(1.0, 0.05)?), neurons: vec![vec![]] };
//! let data = simulate_dataset(&latent, &obs, &SimOptions::default())?;
//!
//! let layout = ParamLayout::choice_only(1);
//! let model = AccumulatorModel::new(layout.clone(), ParamSpec::default_for(&layout), ModelOptions::default())?;
//! let mut params = ParameterSet::new(model.base.clone());
//! let fit = model.fit(&data, &mut params, &MLEOptions::default())?;
//! println!("ℓ̂ = {}", fit.log_likelihood);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod inference;
pub mod latent;
pub mod models;
pub mod observation;
pub mod optimization;
