//! Synthetic data from the continuous accumulator.
//!
//! Purpose
//! -------
//! Generate click trains, choices and spike counts from known parameters so
//! fits can be checked against the truth.
//!
//! Key behaviors
//! -------------
//! - Clicks on each side are Poisson processes; the right share of
//!   `total_rate` is `σ(γ)` for a log-ratio `γ` drawn per trial from
//!   [`SimOptions::log_ratios`].
//! - Clicks are adapted exactly as in the likelihood. Each click moves the
//!   accumulator by its signed magnitude `m` plus `N(0, σ²_s·m)` noise at
//!   the start of its time bin.
//! - Between clicks the accumulator follows `da = λ·a·dt + σ_a·dW`,
//!   integrated with `substeps` Euler–Maruyama steps per bin. Reaching `±B`
//!   absorbs it for the rest of the trial.
//! - With probability `lapse` the choice is a fair coin; otherwise it is
//!   right when the final value exceeds the bias.
//! - Spike counts in bin `t` are Poisson with mean `rate(a_t)·dt`, where
//!   `a_t` is the value at the end of the bin.
//! - A single `StdRng` seeded from [`SimOptions::seed`] drives everything,
//!   so a seed reproduces the dataset exactly.
use crate::{
    latent::{
        clicks::{AdaptationMode, adapt_clicks},
        data::{ClickTrain, Dataset, Trial, TrialSet},
        params::LatentParams,
    },
    models::errors::{ModelError, ModelResult},
    observation::{NeuronParams, ObservationParams, spikes::RATE_FLOOR},
    optimization::numerical_stability::transformations::safe_logistic,
};
use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Bernoulli, Distribution, Exp, Poisson, StandardNormal, Uniform};

/// `SimOptions` — configuration of [`simulate_dataset`].
///
/// Fields
/// ------
/// - `seed`: RNG seed.
/// - `n_trials`: trials per trial set.
/// - `total_rate`: combined left + right click rate in Hz.
/// - `log_ratios`: candidate `ln(r_R / r_L)` values, one drawn per trial.
/// - `min_duration`, `max_duration`: uniform trial duration range (s).
/// - `dt`: time step of the generated trials.
/// - `substeps`: Euler–Maruyama steps per time bin.
/// - `adaptation`: click adaptation mode.
#[derive(Debug, Clone, PartialEq)]
pub struct SimOptions {
    pub seed: u64,
    pub n_trials: usize,
    pub total_rate: f64,
    pub log_ratios: Vec<f64>,
    pub min_duration: f64,
    pub max_duration: f64,
    pub dt: f64,
    pub substeps: usize,
    pub adaptation: AdaptationMode,
}

impl SimOptions {
    /// Errors
    /// ------
    /// - `ModelError::InvalidOptions` for zero trials, a negative or
    ///   non-finite rate, no log-ratios, an empty or inverted duration range,
    ///   a non-positive `dt` or zero substeps.
    pub fn new(
        seed: u64, n_trials: usize, total_rate: f64, log_ratios: Vec<f64>, min_duration: f64,
        max_duration: f64, dt: f64,
    ) -> ModelResult<Self> {
        let opts = SimOptions {
            seed,
            n_trials,
            total_rate,
            log_ratios,
            min_duration,
            max_duration,
            dt,
            substeps: 10,
            adaptation: AdaptationMode::Within,
        };
        opts.validate()?;
        Ok(opts)
    }

    pub fn with_substeps(mut self, substeps: usize) -> ModelResult<Self> {
        self.substeps = substeps;
        self.validate()?;
        Ok(self)
    }

    pub fn with_adaptation(mut self, adaptation: AdaptationMode) -> Self {
        self.adaptation = adaptation;
        self
    }

    fn validate(&self) -> ModelResult<()> {
        let fail = |reason| Err(ModelError::InvalidOptions { reason });
        if self.n_trials == 0 {
            return fail("n_trials must be > 0");
        }
        if !(self.total_rate.is_finite() && self.total_rate >= 0.0) {
            return fail("total_rate must be finite and >= 0");
        }
        if self.log_ratios.is_empty() || self.log_ratios.iter().any(|g| !g.is_finite()) {
            return fail("log_ratios must be non-empty and finite");
        }
        if !(self.min_duration.is_finite() && self.min_duration > 0.0) {
            return fail("min_duration must be finite and > 0");
        }
        if !(self.max_duration.is_finite() && self.max_duration >= self.min_duration) {
            return fail("max_duration must be finite and >= min_duration");
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return fail("dt must be finite and > 0");
        }
        if self.substeps == 0 {
            return fail("substeps must be > 0");
        }
        Ok(())
    }
}

impl Default for SimOptions {
    fn default() -> Self {
        SimOptions {
            seed: 0,
            n_trials: 500,
            total_rate: 40.0,
            log_ratios: vec![-3.5, -2.5, -1.5, -0.5, 0.5, 1.5, 2.5, 3.5],
            min_duration: 0.1,
            max_duration: 1.0,
            dt: 1e-2,
            substeps: 10,
            adaptation: AdaptationMode::Within,
        }
    }
}

/// Simulate `opts.n_trials` trials for every trial set of `obs`.
///
/// Parameters
/// ----------
/// - `latent`: generative θz.
/// - `obs`: generative observation parameters. `obs.neurons` fixes the
///   number of trial sets and each set's neurons; choices are recorded when
///   `obs.choice` is present.
/// - `opts`: simulation settings.
///
/// Errors
/// ------
/// - `ModelError::Simulation` when `obs` describes no trial set or a
///   sampling distribution cannot be built (e.g. an infinite firing rate).
/// - `ModelError::Latent` when adaptation parameters are invalid.
pub fn simulate_dataset(
    latent: &LatentParams, obs: &ObservationParams, opts: &SimOptions,
) -> ModelResult<Dataset> {
    opts.validate()?;
    if obs.neurons.is_empty() {
        return Err(ModelError::Simulation { reason: "no trial sets to simulate".to_string() });
    }
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let sets = obs
        .neurons
        .iter()
        .map(|neurons| {
            let trials = (0..opts.n_trials)
                .map(|_| simulate_trial(latent, obs, neurons, opts, &mut rng))
                .collect::<ModelResult<Vec<_>>>()?;
            Ok(TrialSet::new(trials)?)
        })
        .collect::<ModelResult<Vec<_>>>()?;
    Ok(Dataset::new(sets, opts.dt)?)
}

fn sim_error(err: impl std::fmt::Display) -> ModelError {
    ModelError::Simulation { reason: err.to_string() }
}

fn simulate_trial(
    latent: &LatentParams, obs: &ObservationParams, neurons: &[NeuronParams], opts: &SimOptions,
    rng: &mut StdRng,
) -> ModelResult<Trial> {
    let dt = opts.dt;
    let duration = if opts.max_duration > opts.min_duration {
        Uniform::new(opts.min_duration, opts.max_duration).sample(rng)
    } else {
        opts.min_duration
    };
    let n_time_bins = ((duration / dt).ceil() as usize).max(1);
    let span = n_time_bins as f64 * dt;

    let gamma = opts.log_ratios[Uniform::new(0, opts.log_ratios.len()).sample(rng)];
    let right_rate = opts.total_rate * safe_logistic(gamma);
    let left_rate = opts.total_rate - right_rate;
    let left = poisson_train(left_rate, span, rng)?;
    let right = poisson_train(right_rate, span, rng)?;
    let trial = Trial::new(ClickTrain::new(left, right)?, n_time_bins, dt)?;

    let adapted = adapt_clicks(latent.phi, latent.tau_phi, &trial.clicks, opts.adaptation)?;
    let mut kicks: Vec<Vec<f64>> = vec![Vec::new(); n_time_bins];
    for (&bin, &m) in trial.binned.left.iter().zip(adapted.left.iter()) {
        kicks[bin].push(-m);
    }
    for (&bin, &m) in trial.binned.right.iter().zip(adapted.right.iter()) {
        kicks[bin].push(m);
    }

    let path = accumulate(latent, &kicks, dt, opts.substeps, rng);
    let a_final = path.last().copied().unwrap_or(0.0);

    let mut trial = trial;
    if let Some(choice) = &obs.choice {
        let lapsed = Bernoulli::new(choice.lapse).map_err(sim_error)?.sample(rng);
        let right = if lapsed {
            Bernoulli::new(0.5).map_err(sim_error)?.sample(rng)
        } else {
            a_final > choice.bias
        };
        trial = trial.with_choice(right);
    }
    if !neurons.is_empty() {
        let mut counts = Array2::<u32>::zeros((n_time_bins, neurons.len()));
        for (t, &a) in path.iter().enumerate() {
            for (j, neuron) in neurons.iter().enumerate() {
                let mean = neuron.rate(a).max(RATE_FLOOR) * dt;
                let count: f64 = Poisson::new(mean).map_err(sim_error)?.sample(rng);
                counts[[t, j]] = count as u32;
            }
        }
        trial = trial.with_spikes(counts)?;
    }
    Ok(trial)
}

/// Click times of a homogeneous Poisson process on `(0, span)`.
fn poisson_train(rate: f64, span: f64, rng: &mut StdRng) -> ModelResult<Vec<f64>> {
    if rate <= 0.0 {
        return Ok(Vec::new());
    }
    let gaps = Exp::new(rate).map_err(sim_error)?;
    let mut times = Vec::new();
    let mut t = gaps.sample(rng);
    while t < span {
        times.push(t);
        t += gaps.sample(rng);
    }
    Ok(times)
}

fn gauss(rng: &mut StdRng) -> f64 {
    StandardNormal.sample(rng)
}

/// Accumulator value at the end of every time bin.
fn accumulate(
    latent: &LatentParams, kicks: &[Vec<f64>], dt: f64, substeps: usize, rng: &mut StdRng,
) -> Vec<f64> {
    let bound = latent.bound;
    let h = dt / substeps as f64;
    let diffusion = (latent.sigma2_a * h).sqrt();
    let mut a = latent.sigma2_i.sqrt() * gauss(rng);
    let mut absorbed = a.abs() >= bound;
    if absorbed {
        a = bound.copysign(a);
    }
    let mut path = Vec::with_capacity(kicks.len());
    for bin_kicks in kicks {
        if !absorbed {
            for &m in bin_kicks {
                a += m + (latent.sigma2_s * m.abs()).sqrt() * gauss(rng);
            }
            for _ in 0..substeps {
                if a.abs() >= bound {
                    break;
                }
                a += latent.lambda * a * h + diffusion * gauss(rng);
            }
            if a.abs() >= bound {
                a = bound.copysign(a);
                absorbed = true;
            }
        }
        path.push(a);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{ChoiceParams, LinkFunction};

    fn quiet_latent() -> LatentParams {
        LatentParams::new(0.0, 40.0, 0.0, 0.0, 0.0, 1.0, 0.1).unwrap()
    }

    fn opts(seed: u64, n_trials: usize) -> SimOptions {
        SimOptions::new(seed, n_trials, 40.0, vec![-1.0, 1.0], 0.1, 0.3, 0.01).unwrap()
    }

    fn choice_obs(lapse: f64) -> ObservationParams {
        ObservationParams { choice: Some(ChoiceParams::new(0.0, lapse).unwrap()), neurons: vec![vec![]] }
    }

    #[test]
    // Purpose
    // -------
    // A seed fully determines the simulated dataset.
    //
    // Given
    // -----
    // - Two runs with seed 7 and one with seed 8.
    //
    // Expect
    // ------
    // - The seed-7 datasets are equal; the seed-8 one differs.
    fn simulation_is_reproducible_per_seed() {
        let latent = LatentParams::new(0.5, 10.0, -0.3, 2.0, 1.0, 0.5, 0.05).unwrap();
        let obs = choice_obs(0.1);

        let a = simulate_dataset(&latent, &obs, &opts(7, 40)).unwrap();
        let b = simulate_dataset(&latent, &obs, &opts(7, 40)).unwrap();
        let c = simulate_dataset(&latent, &obs, &opts(8, 40)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.n_trials(), 40);
    }

    #[test]
    // Purpose
    // -------
    // The adaptation mode only matters when clicks depress each other.
    //
    // Given
    // -----
    // - The same seed simulated with within-stream and cross-stream
    //   adaptation, once with ϕ = 1 and once with ϕ = 0.5.
    //
    // Expect
    // ------
    // - With ϕ = 1 the datasets are identical.
    // - Either way the click trains match, since adaptation never draws from
    //   the generator.
    fn adaptation_mode_is_inert_without_depression() {
        let obs = choice_obs(0.1);
        let cross = |seed| opts(seed, 60).with_adaptation(AdaptationMode::Cross);

        let flat = LatentParams::new(0.5, 10.0, -0.3, 2.0, 1.0, 1.0, 0.05).unwrap();
        let within = simulate_dataset(&flat, &obs, &opts(5, 60)).unwrap();
        assert_eq!(simulate_dataset(&flat, &obs, &cross(5)).unwrap(), within);

        let depressed = LatentParams::new(0.5, 10.0, -0.3, 2.0, 1.0, 0.5, 0.05).unwrap();
        let a = simulate_dataset(&depressed, &obs, &opts(5, 60)).unwrap();
        let b = simulate_dataset(&depressed, &obs, &cross(5)).unwrap();
        for (x, y) in a.sets[0].trials.iter().zip(&b.sets[0].trials) {
            assert_eq!(x.clicks, y.clicks);
        }
    }

    #[test]
    // Purpose
    // -------
    // Without noise, adaptation or lapses the choice is the sign of the
    // click-count difference.
    //
    // Given
    // -----
    // - All variances 0, λ = 0, ϕ = 1, B = 40, bias 0, lapse 0.
    //
    // Expect
    // ------
    // - choice == (#right > #left) on every trial.
    fn noiseless_choice_follows_click_counts() {
        let data = simulate_dataset(&quiet_latent(), &choice_obs(0.0), &opts(3, 200)).unwrap();

        for trial in &data.sets[0].trials {
            let expected = trial.clicks.right.len() > trial.clicks.left.len();
            assert_eq!(trial.choice, Some(expected));
            assert!(trial.spikes.is_none());
        }
    }

    #[test]
    // Purpose
    // -------
    // Spike counts have one column per neuron and the configured mean rate.
    //
    // Given
    // -----
    // - One set with two exponential neurons at a constant 20 Hz, no choice
    //   readout.
    //
    // Expect
    // ------
    // - Spike matrices are (bins × 2); pooled rate within 15% of 20 Hz;
    //   choices absent.
    fn spikes_match_shape_and_rate() {
        let neuron =
            NeuronParams::new(LinkFunction::Exponential, vec![20f64.ln(), 0.0]).unwrap();
        let obs = ObservationParams { choice: None, neurons: vec![vec![neuron.clone(), neuron]] };

        let data = simulate_dataset(&quiet_latent(), &obs, &opts(11, 200)).unwrap();

        let mut total_counts = 0u64;
        let mut total_time = 0.0;
        for trial in &data.sets[0].trials {
            let spikes = trial.spikes.as_ref().unwrap();
            assert_eq!(spikes.dim(), (trial.n_time_bins, 2));
            assert!(trial.choice.is_none());
            total_counts += spikes.iter().map(|&k| k as u64).sum::<u64>();
            total_time += 2.0 * trial.n_time_bins as f64 * trial.dt;
        }
        let rate = total_counts as f64 / total_time;
        assert!((rate - 20.0).abs() < 3.0, "pooled rate {rate}");
        assert_eq!(data.neurons_per_set(), vec![2]);
    }

    #[test]
    // Purpose
    // -------
    // Invalid simulation settings are rejected.
    //
    // Given
    // -----
    // - Zero trials, an inverted duration range, zero substeps, no sets.
    //
    // Expect
    // ------
    // - `InvalidOptions` for the settings and `Simulation` for no sets.
    fn invalid_settings_are_rejected() {
        assert!(matches!(
            SimOptions::new(0, 0, 40.0, vec![0.0], 0.1, 0.2, 0.01),
            Err(ModelError::InvalidOptions { .. })
        ));
        assert!(matches!(
            SimOptions::new(0, 5, 40.0, vec![0.0], 0.5, 0.2, 0.01),
            Err(ModelError::InvalidOptions { .. })
        ));
        assert!(matches!(opts(0, 5).with_substeps(0), Err(ModelError::InvalidOptions { .. })));

        let none = ObservationParams { choice: None, neurons: vec![] };
        assert!(matches!(
            simulate_dataset(&quiet_latent(), &none, &opts(0, 5)),
            Err(ModelError::Simulation { .. })
        ));
    }
}
