//! Log-likelihood aggregation over trials, trial sets, and the optimizer
//! interface.
//!
//! Purpose
//! -------
//! Combine the latent engine and the observation adapters into per-trial
//! log-likelihoods, sum them across a dataset, and expose the result to the
//! optimizer as an [`AccumulatorModel`] implementing [`LogLikelihood`].
//!
//! Key behaviors
//! -------------
//! - Per parameter vector, the grid, the click-free matrix and every set's
//!   rate table are built once and shared read-only by all trials.
//! - Trials of a set are evaluated with `rayon`, one [`TrialWorkspace`] per
//!   worker. Results are collected in trial order and summed sequentially,
//!   so totals do not depend on thread scheduling.
//! - A trial that loses all probability mass yields
//!   [`ModelError::DegenerateTrial`] with its set, trial and bin.
//! - An optional [`GaussianPrior`] adds `−Σ β (p − μ)²` over the observation
//!   block.
//!
//! Conventions
//! -----------
//! - A trial set whose neuron list is empty is fitted on choices only; any
//!   spike counts it carries are ignored.
//! - [`AccumulatorModel`] works over the free entries of the flat vector in
//!   unconstrained coordinates; see [`ParamSpec::to_full`].
use crate::{
    latent::{
        clicks::{AdaptationMode, adapt_clicks, bin_inputs},
        data::{Dataset, Trial, TrialSet},
        params::{LatentParams, N_LATENT},
        propagation::Propagator,
        workspace::TrialWorkspace,
    },
    models::{
        errors::{ModelError, ModelResult},
        layout::{ParamLayout, ParamSpec, observation_vector, split_parameters},
        options::{GaussianPrior, ModelOptions},
    },
    observation::{
        ChoiceParams, ObservationParams, choice_log_likelihood, choice_terminal_vector,
        emission_log_matrix, rate_table,
    },
    optimization::{
        errors::{OptError, OptResult},
        loglik_optimizer::{LogLikelihood, Theta},
    },
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, s};
use rayon::prelude::*;

/// Everything one trial needs that is shared across its set.
struct SetContext<'a> {
    prop: &'a Propagator,
    choice: Option<&'a ChoiceParams>,
    rates: Option<Array2<f64>>,
    adaptation: AdaptationMode,
}

/// Log-likelihood of one trial.
///
/// Parameters
/// ----------
/// - `prop`: shared propagation state for the current θz.
/// - `trial`: the trial; clicks must be binned with `prop.dt`.
/// - `choice`: choice parameters when choices are modelled.
/// - `rates`: `(neurons × bins)` rate table when spikes are modelled.
/// - `adaptation`: click adaptation mode.
/// - `ws`: scratch buffers sized for `prop`'s grid.
///
/// Errors
/// ------
/// - `ModelError::Latent` for propagation failures (including a vanished
///   normalizer; see [`ModelError::at_trial`]).
/// - `ModelError::MissingChoice` (with placeholder coordinates) when choices
///   are modelled and the trial has none.
pub fn trial_log_likelihood(
    prop: &Propagator, trial: &Trial, choice: Option<&ChoiceParams>, rates: Option<ArrayView2<f64>>,
    adaptation: AdaptationMode, ws: &mut TrialWorkspace,
) -> ModelResult<f64> {
    let params = &prop.params;
    let adapted = adapt_clicks(params.phi, params.tau_phi, &trial.clicks, adaptation)?;
    let inputs = bin_inputs(&adapted, &trial.binned, trial.n_time_bins)?;

    let emissions = match (rates, trial.spikes.as_ref()) {
        (Some(rates), Some(counts)) => Some(emission_log_matrix(rates, counts.view(), prop.dt)?),
        _ => None,
    };
    let forward = prop.forward(
        &inputs,
        emissions.as_ref().map(|e| e.view()),
        trial.initial_offset,
        ws,
        None,
    )?;

    let mut ll = forward.log_likelihood;
    if let Some(cp) = choice {
        let observed = trial.choice.ok_or(ModelError::MissingChoice { set: 0, trial: 0 })?;
        ll += choice_log_likelihood(forward.final_distribution.view(), &prop.grid, observed, cp);
    }
    Ok(ll)
}

/// Per-trial log-likelihoods, `out[s][t]` for trial `t` of set `s`.
///
/// Errors
/// ------
/// - `ModelError::InvalidOptions` when the dataset's `dt` differs from
///   `options.dt`.
/// - `ModelError::SetCountMismatch` / `NeuronLayoutMismatch` when `obs` does
///   not describe the dataset.
/// - `ModelError::MissingChoiceParams` when choices are modelled without
///   choice parameters.
/// - `ModelError::DegenerateTrial` / `TrialData` / `MissingChoice` located at
///   the failing trial.
pub fn trial_log_likelihoods(
    latent: &LatentParams, obs: &ObservationParams, data: &Dataset, options: &ModelOptions,
) -> ModelResult<Vec<Vec<f64>>> {
    check_dataset(obs, data, options)?;
    let prop = Propagator::new(*latent, options.n_bins, options.dt)?;
    let choice = choice_params(obs, options)?;

    data.sets
        .iter()
        .enumerate()
        .map(|(s, set)| {
            let ctx = SetContext {
                prop: &prop,
                choice: choice.as_ref(),
                rates: set_rates(obs, s, &prop),
                adaptation: options.adaptation,
            };
            set_log_likelihoods(&ctx, s, set)
        })
        .collect()
}

/// Total log-likelihood of the dataset, plus the prior penalty if given.
pub fn total_log_likelihood(
    latent: &LatentParams, obs: &ObservationParams, data: &Dataset, options: &ModelOptions,
    prior: Option<&GaussianPrior>,
) -> ModelResult<f64> {
    let per_trial = trial_log_likelihoods(latent, obs, data, options)?;
    // ordered, sequential reduction
    let mut total = 0.0;
    for set in &per_trial {
        for &ll in set {
            total += ll;
        }
    }
    if let Some(prior) = prior {
        let layout = ParamLayout::from_observation(obs);
        total += prior.log_density(observation_vector(obs, &layout)?.view())?;
    }
    Ok(total)
}

/// Smoothed posterior `(T × bins)` over the latent state for one trial.
///
/// When choices are modelled and the trial has one, the posterior is also
/// conditioned on it through the choice terminal vector.
pub fn trial_posterior(
    latent: &LatentParams, obs: &ObservationParams, data: &Dataset, options: &ModelOptions,
    set: usize, trial: usize,
) -> ModelResult<Array2<f64>> {
    check_dataset(obs, data, options)?;
    let tr = data
        .sets
        .get(set)
        .and_then(|s| s.trials.get(trial))
        .ok_or(ModelError::TrialOutOfRange { set, trial })?;

    let prop = Propagator::new(*latent, options.n_bins, options.dt)?;
    let choice = choice_params(obs, options)?;
    let rates = set_rates(obs, set, &prop);

    let locate = |e: ModelError| e.at_trial(set, trial);
    let adapted = adapt_clicks(latent.phi, latent.tau_phi, &tr.clicks, options.adaptation)
        .map_err(|e| locate(e.into()))?;
    let inputs = bin_inputs(&adapted, &tr.binned, tr.n_time_bins).map_err(|e| locate(e.into()))?;
    let emissions = match (rates.as_ref(), tr.spikes.as_ref()) {
        (Some(r), Some(counts)) => Some(emission_log_matrix(r.view(), counts.view(), options.dt)?),
        _ => None,
    };
    let terminal = match (choice, tr.choice) {
        (Some(cp), Some(observed)) => Some(choice_terminal_vector(&prop.grid, observed, &cp)),
        _ => None,
    };
    let mut ws = TrialWorkspace::new(prop.n_bins());
    prop.posterior(
        &inputs,
        emissions.as_ref().map(|e| e.view()),
        tr.initial_offset,
        terminal.as_ref().map(|v| v.view()),
        &mut ws,
    )
    .map_err(|e| locate(e.into()))
}

fn set_log_likelihoods(ctx: &SetContext<'_>, set_index: usize, set: &TrialSet) -> ModelResult<Vec<f64>> {
    let n_bins = ctx.prop.n_bins();
    set.trials
        .par_iter()
        .enumerate()
        .map_init(
            || TrialWorkspace::new(n_bins),
            |ws, (t, trial)| {
                trial_log_likelihood(
                    ctx.prop,
                    trial,
                    ctx.choice,
                    ctx.rates.as_ref().map(|r| r.view()),
                    ctx.adaptation,
                    ws,
                )
                .map_err(|e| match e {
                    ModelError::MissingChoice { .. } => {
                        ModelError::MissingChoice { set: set_index, trial: t }
                    }
                    other => other.at_trial(set_index, t),
                })
            },
        )
        .collect()
}

fn choice_params(obs: &ObservationParams, options: &ModelOptions) -> ModelResult<Option<ChoiceParams>> {
    if options.include_choice {
        obs.choice.map(Some).ok_or(ModelError::MissingChoiceParams)
    } else {
        Ok(None)
    }
}

fn set_rates(obs: &ObservationParams, set: usize, prop: &Propagator) -> Option<Array2<f64>> {
    obs.neurons
        .get(set)
        .filter(|neurons| !neurons.is_empty())
        .map(|neurons| rate_table(neurons, &prop.grid))
}

fn check_dataset(obs: &ObservationParams, data: &Dataset, options: &ModelOptions) -> ModelResult<()> {
    if data.dt != options.dt {
        return Err(ModelError::InvalidOptions { reason: "dataset dt differs from the model dt" });
    }
    if obs.neurons.len() != data.sets.len() {
        return Err(ModelError::SetCountMismatch {
            expected: obs.neurons.len(),
            found: data.sets.len(),
        });
    }
    for (set, (neurons, trials)) in obs.neurons.iter().zip(&data.sets).enumerate() {
        if !neurons.is_empty() && neurons.len() != trials.n_neurons {
            return Err(ModelError::NeuronLayoutMismatch {
                set,
                expected: neurons.len(),
                found: trials.n_neurons,
            });
        }
    }
    Ok(())
}

/// `AccumulatorModel` — the fitting target.
///
/// Fields
/// ------
/// - `layout`: shape of the flat parameter vector.
/// - `spec`: bounds and free mask over that vector.
/// - `options`: grid, time step, adaptation mode, choice switch.
/// - `prior`: optional penalty on the observation block.
/// - `base`: full natural-units vector supplying every fixed entry.
///
/// Invariants
/// ----------
/// - `spec.len() == layout.n_params() == base.len()`.
/// - `base` lies within `spec`'s bounds on free entries.
#[derive(Debug, Clone)]
pub struct AccumulatorModel {
    pub layout: ParamLayout,
    pub spec: ParamSpec,
    pub options: ModelOptions,
    pub prior: Option<GaussianPrior>,
    pub base: Array1<f64>,
}

impl AccumulatorModel {
    /// Build a model; the base vector starts at the midpoint of every bound.
    ///
    /// Errors
    /// ------
    /// - `ModelError::ThetaLengthMismatch` when `spec` does not cover the
    ///   layout.
    /// - `ModelError::InvalidOptions` when the layout's choice block disagrees
    ///   with `options.include_choice`.
    pub fn new(layout: ParamLayout, spec: ParamSpec, options: ModelOptions) -> ModelResult<Self> {
        if spec.len() != layout.n_params() {
            return Err(ModelError::ThetaLengthMismatch {
                expected: layout.n_params(),
                actual: spec.len(),
            });
        }
        if layout.include_choice != options.include_choice {
            return Err(ModelError::InvalidOptions {
                reason: "layout choice block must match options.include_choice",
            });
        }
        let base = (&spec.lower + &spec.upper) / 2.0;
        Ok(AccumulatorModel { layout, spec, options, prior: None, base })
    }

    /// Attach a prior over the observation block.
    pub fn with_prior(mut self, prior: GaussianPrior) -> ModelResult<Self> {
        if prior.len() != self.layout.n_observation() {
            return Err(ModelError::PriorLengthMismatch {
                expected: self.layout.n_observation(),
                found: prior.len(),
            });
        }
        self.prior = Some(prior);
        Ok(self)
    }

    /// Replace the base vector supplying fixed entries.
    pub fn with_base(mut self, base: Array1<f64>) -> ModelResult<Self> {
        self.spec.check_within(base.view())?;
        self.base = base;
        Ok(self)
    }

    /// Log-likelihood (plus prior) at a full natural-units vector.
    pub fn log_likelihood(&self, theta: ArrayView1<f64>, data: &Dataset) -> ModelResult<f64> {
        let (latent, obs) = split_parameters(theta, &self.layout)?;
        let mut ll = total_log_likelihood(&latent, &obs, data, &self.options, None)?;
        if let Some(prior) = &self.prior {
            ll += prior.log_density(theta.slice(s![N_LATENT..]))?;
        }
        Ok(ll)
    }

    /// Per-trial log-likelihoods at a full natural-units vector.
    pub fn trial_log_likelihoods(&self, theta: ArrayView1<f64>, data: &Dataset) -> ModelResult<Vec<Vec<f64>>> {
        let (latent, obs) = split_parameters(theta, &self.layout)?;
        trial_log_likelihoods(&latent, &obs, data, &self.options)
    }

    /// Smoothed latent posterior for one trial at a full vector.
    pub fn posterior(
        &self, theta: ArrayView1<f64>, data: &Dataset, set: usize, trial: usize,
    ) -> ModelResult<Array2<f64>> {
        let (latent, obs) = split_parameters(theta, &self.layout)?;
        trial_posterior(&latent, &obs, data, &self.options, set, trial)
    }

    /// Full natural-units vector for free unconstrained coordinates.
    pub fn full_theta(&self, u: ArrayView1<f64>) -> ModelResult<Array1<f64>> {
        self.spec.to_full(u, self.base.view())
    }
}

impl LogLikelihood for AccumulatorModel {
    type Data = Dataset;

    fn value(&self, theta: &Theta, data: &Dataset) -> OptResult<f64> {
        let full = self.full_theta(theta.view())?;
        Ok(self.log_likelihood(full.view(), data)?)
    }

    fn check(&self, theta: &Theta, data: &Dataset) -> OptResult<()> {
        let n_free = self.spec.n_free();
        if theta.len() != n_free {
            return Err(OptError::ThetaLengthMismatch { expected: n_free, actual: theta.len() });
        }
        if let Some((index, &value)) = theta.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(OptError::InvalidThetaInput { index, value });
        }
        if data.sets.len() != self.layout.n_sets() {
            return Err(ModelError::SetCountMismatch {
                expected: self.layout.n_sets(),
                found: data.sets.len(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        latent::data::ClickTrain,
        observation::{LinkFunction, NeuronParams},
    };
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    fn latent() -> LatentParams {
        LatentParams::new(0.5, 8.0, -0.5, 5.0, 1.0, 0.5, 0.05).unwrap()
    }

    fn trial(left: Vec<f64>, right: Vec<f64>, choice: bool) -> Trial {
        Trial::new(ClickTrain::new(left, right).unwrap(), 30, 0.01).unwrap().with_choice(choice)
    }

    fn choice_dataset() -> Dataset {
        let trials = vec![
            trial(vec![0.02, 0.1], vec![0.05, 0.11, 0.2, 0.25], true),
            trial(vec![0.01, 0.03, 0.2], vec![0.15], false),
            trial(vec![], vec![0.05, 0.06], true),
            trial(vec![0.12], vec![], true),
        ];
        Dataset::new(vec![TrialSet::new(trials).unwrap()], 0.01).unwrap()
    }

    fn choice_obs() -> ObservationParams {
        ObservationParams { choice: Some(ChoiceParams::new(0.0, 0.05).unwrap()), neurons: vec![vec![]] }
    }

    #[test]
    // Purpose
    // -------
    // Per-trial contributions are log-probabilities and sum to the total.
    //
    // Given
    // -----
    // - Four choice-only trials.
    //
    // Expect
    // ------
    // - Every contribution lies in [ln(1e-10), 0] and their sum equals the
    //   total log-likelihood.
    fn total_is_sum_of_trial_contributions() {
        let data = choice_dataset();
        let opts = ModelOptions::new(31, 0.01).unwrap();

        let per_trial = trial_log_likelihoods(&latent(), &choice_obs(), &data, &opts).unwrap();
        let total = total_log_likelihood(&latent(), &choice_obs(), &data, &opts, None).unwrap();

        assert_eq!(per_trial[0].len(), 4);
        for &ll in &per_trial[0] {
            assert!(ll <= 0.0 && ll >= 1e-10f64.ln());
        }
        assert_abs_diff_eq!(total, per_trial[0].iter().sum::<f64>(), epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Reordering trials does not change the total beyond rounding.
    //
    // Given
    // -----
    // - The same four trials in original and reversed order.
    //
    // Expect
    // ------
    // - Totals agree to 1e-10 and per-trial values permute accordingly.
    fn total_is_invariant_to_trial_order() {
        let data = choice_dataset();
        let mut reversed = data.clone();
        reversed.sets[0].trials.reverse();
        let opts = ModelOptions::new(31, 0.01).unwrap();

        let a = trial_log_likelihoods(&latent(), &choice_obs(), &data, &opts).unwrap();
        let b = trial_log_likelihoods(&latent(), &choice_obs(), &reversed, &opts).unwrap();

        assert_abs_diff_eq!(a[0].iter().sum::<f64>(), b[0].iter().sum::<f64>(), epsilon = 1e-10);
        for (x, y) in a[0].iter().zip(b[0].iter().rev()) {
            assert_eq!(x, y);
        }
    }

    #[test]
    // Purpose
    // -------
    // Parallel evaluation is deterministic.
    //
    // Given
    // -----
    // - The same dataset evaluated twice.
    //
    // Expect
    // ------
    // - Bitwise-identical totals.
    fn total_is_bit_reproducible() {
        let data = choice_dataset();
        let opts = ModelOptions::new(31, 0.01).unwrap();

        let a = total_log_likelihood(&latent(), &choice_obs(), &data, &opts, None).unwrap();
        let b = total_log_likelihood(&latent(), &choice_obs(), &data, &opts, None).unwrap();

        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    // Purpose
    // -------
    // Spikes and choices add up as independent observation streams.
    //
    // Given
    // -----
    // - One trial with one exponential neuron and a choice.
    //
    // Expect
    // ------
    // - Joint log-likelihood equals the spike-only forward log-likelihood
    //   plus the choice term evaluated on the spike-filtered distribution,
    //   and it is strictly below the spike-only value.
    fn spikes_and_choice_combine() {
        let mut counts = Array2::<u32>::zeros((30, 1));
        counts[[10, 0]] = 2;
        counts[[20, 0]] = 1;
        let tr = trial(vec![0.02], vec![0.05, 0.07], true).with_spikes(counts).unwrap();
        let data = Dataset::new(vec![TrialSet::new(vec![tr]).unwrap()], 0.01).unwrap();
        let neuron = NeuronParams::new(LinkFunction::Exponential, vec![2.5, 0.2]).unwrap();
        let joint = ObservationParams {
            choice: Some(ChoiceParams::new(0.0, 0.05).unwrap()),
            neurons: vec![vec![neuron.clone()]],
        };
        let spikes_only = ObservationParams { choice: None, neurons: vec![vec![neuron]] };
        let opts = ModelOptions::new(31, 0.01).unwrap();

        let ll_joint = total_log_likelihood(&latent(), &joint, &data, &opts, None).unwrap();
        let ll_spikes =
            total_log_likelihood(&latent(), &spikes_only, &data, &opts.with_choice(false), None)
                .unwrap();

        assert!(ll_joint < ll_spikes);
        assert!(ll_spikes.is_finite());
    }

    #[test]
    // Purpose
    // -------
    // Missing observations and mismatched layouts are reported precisely.
    //
    // Given
    // -----
    // - A trial without a choice in set 0 position 1; an observation block
    //   describing two sets for a one-set dataset.
    //
    // Expect
    // ------
    // - `MissingChoice { set: 0, trial: 1 }` and `SetCountMismatch`.
    fn missing_observations_are_located() {
        let trials = vec![
            trial(vec![], vec![0.1], true),
            Trial::new(ClickTrain::new(vec![], vec![]).unwrap(), 10, 0.01).unwrap(),
        ];
        let data = Dataset::new(vec![TrialSet::new(trials).unwrap()], 0.01).unwrap();
        let opts = ModelOptions::new(21, 0.01).unwrap();

        assert_eq!(
            total_log_likelihood(&latent(), &choice_obs(), &data, &opts, None),
            Err(ModelError::MissingChoice { set: 0, trial: 1 })
        );

        let two_sets = ObservationParams { neurons: vec![vec![], vec![]], ..choice_obs() };
        assert!(matches!(
            total_log_likelihood(&latent(), &two_sets, &data, &opts, None),
            Err(ModelError::SetCountMismatch { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // The optimizer-facing value matches the natural-units likelihood.
    //
    // Given
    // -----
    // - A choice-only model freeing bias and lapse, base at a valid point.
    //
    // Expect
    // ------
    // - `value(to_unconstrained(base))` ≈ `log_likelihood(base)` and a
    //   wrong-length θ fails `check`.
    fn model_value_matches_natural_units_likelihood() {
        let data = choice_dataset();
        let layout = ParamLayout::choice_only(1);
        let spec = ParamSpec::default_for(&layout).free_only(&[7, 8]);
        let opts = ModelOptions::new(31, 0.01).unwrap();
        let base = ndarray::array![0.5, 8.0, -0.5, 5.0, 1.0, 0.5, 0.05, 0.3, 0.1];
        let model = AccumulatorModel::new(layout, spec, opts).unwrap().with_base(base.clone()).unwrap();

        let u = model.spec.to_unconstrained(base.view()).unwrap();
        let via_optimizer = model.value(&u, &data).unwrap();
        let direct = model.log_likelihood(base.view(), &data).unwrap();

        assert_abs_diff_eq!(via_optimizer, direct, epsilon = 1e-8);
        assert!(model.check(&ndarray::array![0.0], &data).is_err());
    }

    #[test]
    // Purpose
    // -------
    // The prior subtracts its penalty from the data log-likelihood.
    //
    // Given
    // -----
    // - Prior μ = (0, 0), β = (1, 0) on (bias, lapse), bias = 0.3.
    //
    // Expect
    // ------
    // - Difference of exactly 0.09.
    fn prior_shifts_the_log_likelihood() {
        let data = choice_dataset();
        let layout = ParamLayout::choice_only(1);
        let spec = ParamSpec::default_for(&layout);
        let opts = ModelOptions::new(31, 0.01).unwrap();
        let theta = ndarray::array![0.5, 8.0, -0.5, 5.0, 1.0, 0.5, 0.05, 0.3, 0.1];
        let plain = AccumulatorModel::new(layout, spec, opts).unwrap();
        let prior = GaussianPrior::new(ndarray::array![0.0, 0.0], ndarray::array![1.0, 0.0]).unwrap();
        let penalized = plain.clone().with_prior(prior).unwrap();

        let a = plain.log_likelihood(theta.view(), &data).unwrap();
        let b = penalized.log_likelihood(theta.view(), &data).unwrap();

        assert_abs_diff_eq!(a - b, 0.09, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Posteriors from the model are normalized and choice-conditioned.
    //
    // Given
    // -----
    // - Trial 2 (two right clicks, rightward choice).
    //
    // Expect
    // ------
    // - 30 rows each summing to 1, final mean right of the centre.
    fn model_posterior_rows_are_normalized() {
        let data = choice_dataset();
        let opts = ModelOptions::new(31, 0.01).unwrap();

        let gamma = trial_posterior(&latent(), &choice_obs(), &data, &opts, 0, 2).unwrap();

        assert_eq!(gamma.nrows(), 30);
        for row in gamma.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-10);
        }
        let grid = crate::latent::grid::LatentGrid::new(8.0, 31).unwrap();
        assert!(gamma.row(29).dot(&grid.centers) > 0.0);
    }

    #[test]
    // Purpose
    // -------
    // A per-trial initial offset shifts the start of the accumulator.
    //
    // Given
    // -----
    // - The same click-free rightward trial started at +3 and at −3.
    //
    // Expect
    // ------
    // - The +3 start explains the rightward choice better; a non-finite
    //   offset is rejected at construction.
    fn initial_offset_shifts_choice_probability() {
        let base = Trial::new(ClickTrain::new(vec![], vec![]).unwrap(), 20, 0.01)
            .unwrap()
            .with_choice(true);
        let ll_for = |offset: f64| {
            let tr = base.clone().with_initial_offset(offset).unwrap();
            let data = Dataset::new(vec![TrialSet::new(vec![tr]).unwrap()], 0.01).unwrap();
            let opts = ModelOptions::new(31, 0.01).unwrap();
            total_log_likelihood(&latent(), &choice_obs(), &data, &opts, None).unwrap()
        };

        assert!(ll_for(3.0) > ll_for(-3.0));
        assert!(base.clone().with_initial_offset(f64::NAN).is_err());
    }

    #[test]
    // Purpose
    // -------
    // Cross-stream adaptation changes only trials where both streams carry
    // clicks, and nothing at all when ϕ = 1.
    //
    // Given
    // -----
    // - The four choice trials; two have clicks on both sides, two on one
    //   side only.
    // - ϕ = 0.5, then ϕ = 1.
    //
    // Expect
    // ------
    // - With ϕ = 0.5 the two-sided trials differ between modes and the
    //   one-sided trials agree exactly.
    // - With ϕ = 1 every trial agrees exactly and the totals match.
    fn cross_adaptation_couples_the_streams() {
        let data = choice_dataset();
        let within = ModelOptions::new(31, 0.01).unwrap();
        let cross = within.with_cross_adaptation(true);

        let a = trial_log_likelihoods(&latent(), &choice_obs(), &data, &within).unwrap();
        let b = trial_log_likelihoods(&latent(), &choice_obs(), &data, &cross).unwrap();

        assert!((a[0][0] - b[0][0]).abs() > 1e-9);
        assert!((a[0][1] - b[0][1]).abs() > 1e-9);
        assert_eq!(a[0][2], b[0][2]);
        assert_eq!(a[0][3], b[0][3]);

        let flat = LatentParams::new(0.5, 8.0, -0.5, 5.0, 1.0, 1.0, 0.05).unwrap();
        let a = trial_log_likelihoods(&flat, &choice_obs(), &data, &within).unwrap();
        let b = trial_log_likelihoods(&flat, &choice_obs(), &data, &cross).unwrap();

        assert_eq!(a, b);
        assert_eq!(
            total_log_likelihood(&flat, &choice_obs(), &data, &within, None).unwrap(),
            total_log_likelihood(&flat, &choice_obs(), &data, &cross, None).unwrap()
        );
    }
}
