//! Maximum-likelihood fitting of an [`AccumulatorModel`].
//!
//! Purpose
//! -------
//! Run the optimizer over the free entries of the flat parameter vector and
//! report the fitted vector together with diagnostics a caller can act on:
//! whether the optimizer converged, which estimates sit on a bound, and a
//! coarse [`FitQuality`] flag.
//!
//! Key behaviors
//! -------------
//! - The fit starts from [`ParameterSet::initial`], which also supplies every
//!   fixed entry.
//! - Optimizer failures never propagate: the best point the optimizer
//!   evaluated (or the initial point when it evaluated none) comes back with
//!   [`FitQuality::OptimizerFailed`] and a `warn!` event.
//! - A successful fit stores the fitted vector in [`ParameterSet::fitted`].
//! - [`initial_neuron_params`] derives link-function start values from the
//!   data, using the running click difference as a latent proxy.
use crate::{
    latent::{
        data::{Dataset, Trial},
        errors::LatentResult,
    },
    models::{
        errors::{ModelError, ModelResult},
        layout::ParamLayout,
        likelihood::AccumulatorModel,
    },
    observation::NeuronParams,
    optimization::{
        errors::OptError,
        loglik_optimizer::{MLEOptions, maximize},
    },
};
use ndarray::{Array1, Array2};
use tracing::{debug, warn};

/// Lifecycle record of one parameter vector.
///
/// Fields
/// ------
/// - `generative`: the vector data were simulated from, when known.
/// - `initial`: start point of the fit; also supplies fixed entries.
/// - `fitted`: the fitted vector once [`AccumulatorModel::fit`] has run.
/// - `confidence`: `(n × 2)` lower/upper interval bounds per entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    pub generative: Option<Array1<f64>>,
    pub initial: Array1<f64>,
    pub fitted: Option<Array1<f64>>,
    pub confidence: Option<Array2<f64>>,
}

impl ParameterSet {
    pub fn new(initial: Array1<f64>) -> Self {
        ParameterSet { generative: None, initial, fitted: None, confidence: None }
    }

    pub fn with_generative(mut self, generative: Array1<f64>) -> Self {
        self.generative = Some(generative);
        self
    }

    /// Fitted vector if present, else the initial one.
    pub fn best(&self) -> &Array1<f64> {
        self.fitted.as_ref().unwrap_or(&self.initial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitQuality {
    Converged,
    MaxIterations,
    OnBoundary,
    OptimizerFailed,
}

/// Result of [`AccumulatorModel::fit`].
///
/// Fields
/// ------
/// - `theta`: full natural-units vector at the optimum.
/// - `log_likelihood`: objective value there (prior included).
/// - `converged`: the optimizer stopped for a convergence reason.
/// - `status`: optimizer termination text.
/// - `iterations`: optimizer iterations.
/// - `at_bounds`: free entries within tolerance of a bound.
/// - `quality`: summary flag; `OnBoundary` takes precedence over
///   `Converged`.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    pub theta: Array1<f64>,
    pub log_likelihood: f64,
    pub converged: bool,
    pub status: String,
    pub iterations: usize,
    pub at_bounds: Vec<usize>,
    pub quality: FitQuality,
}

impl AccumulatorModel {
    /// Fit the free parameters by maximum likelihood.
    ///
    /// Parameters
    /// ----------
    /// - `data`: dataset matching the model's layout and `dt`.
    /// - `params`: start point in `params.initial`; `params.fitted` is set on
    ///   success.
    /// - `opts`: optimizer settings.
    ///
    /// Errors
    /// ------
    /// - `ModelError::NoFreeParameters` when every entry is fixed.
    /// - `ModelError::ThetaLengthMismatch` / `OutsideBounds` for an invalid
    ///   start point.
    ///
    /// Optimizer failures are reported through [`FitQuality::OptimizerFailed`]
    /// rather than as errors; `params.fitted` stays unset in that case.
    pub fn fit(&self, data: &Dataset, params: &mut ParameterSet, opts: &MLEOptions) -> ModelResult<FitOutcome> {
        let n_free = self.spec.n_free();
        if n_free == 0 {
            return Err(ModelError::NoFreeParameters);
        }
        if params.initial.len() != self.layout.n_params() {
            return Err(ModelError::ThetaLengthMismatch {
                expected: self.layout.n_params(),
                actual: params.initial.len(),
            });
        }
        let model = self.clone().with_base(params.initial.clone())?;
        let u0 = model.spec.to_unconstrained(params.initial.view())?;
        debug!(n_free, n_trials = data.n_trials(), "starting accumulator fit");

        let outcome = match maximize(&model, u0, data, opts) {
            Ok(outcome) => outcome,
            Err(err) => return Ok(failed_fit(&model, err, &params.initial, data)),
        };

        let theta = model.full_theta(outcome.theta_hat.view())?;
        let at_bounds = model.spec.at_bounds(theta.view());
        let quality = if !at_bounds.is_empty() {
            FitQuality::OnBoundary
        } else if outcome.converged {
            FitQuality::Converged
        } else {
            FitQuality::MaxIterations
        };
        if !outcome.converged {
            warn!(status = %outcome.status, iterations = outcome.iterations, "fit did not converge");
        }
        if !at_bounds.is_empty() {
            let names = self.layout.names();
            let on_bound: Vec<&str> = at_bounds.iter().map(|&i| names[i].as_str()).collect();
            warn!(?on_bound, "estimates on a parameter bound");
        }
        debug!(
            log_likelihood = outcome.value,
            iterations = outcome.iterations,
            status = %outcome.status,
            "accumulator fit finished"
        );

        params.fitted = Some(theta.clone());
        Ok(FitOutcome {
            theta,
            log_likelihood: outcome.value,
            converged: outcome.converged,
            status: outcome.status,
            iterations: outcome.iterations,
            at_bounds,
            quality,
        })
    }
}

/// Outcome of a fit whose optimizer stopped on `err`: the best evaluated
/// point when `err` carries one, else `initial`.
fn failed_fit(model: &AccumulatorModel, err: OptError, initial: &Array1<f64>, data: &Dataset) -> FitOutcome {
    let best = match &err {
        OptError::StoppedWithBest { theta, value, .. } => {
            model.full_theta(theta.view()).ok().map(|full| (full, *value))
        }
        _ => None,
    };
    let (theta, log_likelihood) = best.unwrap_or_else(|| {
        let ll = model.log_likelihood(initial.view(), data).unwrap_or(f64::NEG_INFINITY);
        (initial.clone(), ll)
    });
    warn!(error = %err, log_likelihood, "optimizer failed; returning the best point evaluated");
    FitOutcome {
        theta,
        log_likelihood,
        converged: false,
        status: err.to_string(),
        iterations: 0,
        at_bounds: Vec::new(),
        quality: FitQuality::OptimizerFailed,
    }
}

/// Start values for every neuron in `layout`, moment-matched to the pooled
/// spike counts of its trial set and clamped into the link's default bounds.
///
/// Errors
/// ------
/// - `ModelError::SetCountMismatch` / `NeuronLayoutMismatch` when `data`
///   does not match `layout`.
/// - `ModelError::Observation` when a neuron has no usable counts.
pub fn initial_neuron_params(data: &Dataset, layout: &ParamLayout) -> ModelResult<Vec<Vec<NeuronParams>>> {
    if data.sets.len() != layout.n_sets() {
        return Err(ModelError::SetCountMismatch { expected: layout.n_sets(), found: data.sets.len() });
    }
    data.sets
        .iter()
        .zip(&layout.links)
        .enumerate()
        .map(|(s, (set, links))| {
            if !links.is_empty() && set.n_neurons != links.len() {
                return Err(ModelError::NeuronLayoutMismatch {
                    set: s,
                    expected: links.len(),
                    found: set.n_neurons,
                });
            }
            let mismatched = set
                .trials
                .iter()
                .filter_map(|t| t.spikes.as_ref().map(|sp| sp.ncols()))
                .find(|&w| !links.is_empty() && w != links.len());
            if let Some(found) = mismatched {
                return Err(ModelError::NeuronLayoutMismatch { set: s, expected: links.len(), found });
            }
            let proxy = set
                .trials
                .iter()
                .map(click_difference)
                .collect::<LatentResult<Vec<_>>>()?
                .concat();
            links
                .iter()
                .enumerate()
                .map(|(j, &link)| {
                    let counts: Vec<f64> = set
                        .trials
                        .iter()
                        .flat_map(|trial| match &trial.spikes {
                            Some(spikes) => spikes.column(j).iter().map(|&k| k as f64).collect(),
                            None => vec![0.0; trial.n_time_bins],
                        })
                        .collect();
                    let (lower, upper) = link.default_bounds();
                    let values = link
                        .initialize(&counts, &proxy, data.dt)?
                        .into_iter()
                        .zip(lower.iter().zip(&upper))
                        .map(|(v, (&lo, &hi))| {
                            let pad = INIT_MARGIN * (hi - lo);
                            v.clamp(lo + pad, hi - pad)
                        })
                        .collect();
                    Ok(NeuronParams::new(link, values)?)
                })
                .collect()
        })
        .collect()
}

/// Fraction of each bound width kept clear when clamping start values.
const INIT_MARGIN: f64 = 1e-3;

/// Running `#right − #left` click count at the end of every time bin.
fn click_difference(trial: &Trial) -> LatentResult<Vec<f64>> {
    trial.binned.check(trial.n_time_bins)?;
    let mut step = vec![0.0; trial.n_time_bins];
    for &bin in &trial.binned.right {
        step[bin] += 1.0;
    }
    for &bin in &trial.binned.left {
        step[bin] -= 1.0;
    }
    Ok(step
        .iter()
        .scan(0.0, |acc, &d| {
            *acc += d;
            Some(*acc)
        })
        .collect())
}
