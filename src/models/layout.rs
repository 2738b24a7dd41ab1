//! Flat parameter vector layout, bounds, and the free/fixed mask.
//!
//! Purpose
//! -------
//! Describe how the named parameter blocks map onto the flat vector seen by
//! the optimizer, and move between the full natural-units vector and the
//! optimizer's unconstrained vector over free entries.
//!
//! Key behaviors
//! -------------
//! - [`ParamLayout`] fixes the order `θz (7) | bias, lapse | set 0 neuron 0
//!   link params | set 0 neuron 1 | … | set 1 neuron 0 | …`. The choice block
//!   is present only when choices are modelled.
//! - [`combine_parameters`] and [`split_parameters`] convert between the
//!   named blocks and the flat vector; they round-trip exactly.
//! - [`ParamSpec`] holds per-entry bounds and the free mask.
//!   [`ParamSpec::to_full`] maps free unconstrained coordinates `u` into
//!   `lb + (ub − lb)·σ(u)` and takes fixed entries from a base vector;
//!   [`ParamSpec::to_unconstrained`] is its inverse on the free entries.
//!
//! Invariants & assumptions
//! ------------------------
//! - `lower[i] < upper[i]` for every entry, enforced at construction.
//! - Free entries produced by `to_full` lie strictly inside their bounds up
//!   to logistic saturation.
use crate::{
    latent::params::{LATENT_NAMES, LatentParams, N_LATENT},
    models::errors::{ModelError, ModelResult},
    observation::{ChoiceParams, LinkFunction, NeuronParams, ObservationParams},
    optimization::numerical_stability::transformations::{from_bounded, to_bounded},
};
use ndarray::{Array1, ArrayView1, s};

/// Default bounds for θz, in flat order.
pub const LATENT_LOWER: [f64; N_LATENT] = [0.0, 2.0, -10.0, 0.0, 0.0, 0.01, 0.005];
pub const LATENT_UPPER: [f64; N_LATENT] = [20.0, 40.0, 10.0, 200.0, 20.0, 1.2, 1.0];

/// Default bounds for (bias, lapse).
pub const CHOICE_LOWER: [f64; 2] = [-10.0, 0.0];
pub const CHOICE_UPPER: [f64; 2] = [10.0, 1.0];

/// Relative distance to a bound below which an estimate counts as on it.
pub const BOUND_TOL: f64 = 1e-6;

/// Shape of the flat parameter vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamLayout {
    pub include_choice: bool,
    /// `links[s][k]`: link function of neuron `k` in trial set `s`.
    pub links: Vec<Vec<LinkFunction>>,
}

impl ParamLayout {
    pub fn new(include_choice: bool, links: Vec<Vec<LinkFunction>>) -> Self {
        ParamLayout { include_choice, links }
    }

    /// Layout of a choice-only model over `n_sets` trial sets.
    pub fn choice_only(n_sets: usize) -> Self {
        ParamLayout { include_choice: true, links: vec![Vec::new(); n_sets] }
    }

    /// Layout matching a set of observation parameters.
    pub fn from_observation(obs: &ObservationParams) -> Self {
        ParamLayout {
            include_choice: obs.choice.is_some(),
            links: obs.neurons.iter().map(|set| set.iter().map(|n| n.link()).collect()).collect(),
        }
    }

    pub fn n_sets(&self) -> usize {
        self.links.len()
    }

    pub fn n_choice(&self) -> usize {
        if self.include_choice { 2 } else { 0 }
    }

    /// Length of the observation block (choice plus neurons).
    pub fn n_observation(&self) -> usize {
        self.n_choice() + self.links.iter().flatten().map(LinkFunction::n_params).sum::<usize>()
    }

    pub fn n_params(&self) -> usize {
        N_LATENT + self.n_observation()
    }

    /// Offset of the first neuron parameter.
    pub fn neuron_offset(&self) -> usize {
        N_LATENT + self.n_choice()
    }

    /// Human-readable name of every entry, e.g. `set0.neuron1.p2`.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = LATENT_NAMES.iter().map(|s| s.to_string()).collect();
        if self.include_choice {
            names.push("bias".to_string());
            names.push("lapse".to_string());
        }
        for (s, set) in self.links.iter().enumerate() {
            for (k, link) in set.iter().enumerate() {
                for p in 0..link.n_params() {
                    names.push(format!("set{s}.neuron{k}.p{}", p + 1));
                }
            }
        }
        names
    }
}

/// Flatten named parameter blocks into one vector in layout order.
///
/// Errors
/// ------
/// - `ModelError::MissingChoiceParams` when the layout includes choices and
///   `obs.choice` is `None`.
/// - `ModelError::SetCountMismatch` / `NeuronLayoutMismatch` when `obs` does
///   not match the layout.
pub fn combine_parameters(
    latent: &LatentParams, obs: &ObservationParams, layout: &ParamLayout,
) -> ModelResult<Array1<f64>> {
    check_observation(obs, layout)?;
    let mut theta = Vec::with_capacity(layout.n_params());
    theta.extend(latent.to_array().iter());
    theta.extend(observation_vector(obs, layout)?.iter());
    Ok(Array1::from(theta))
}

/// Observation block of the flat vector.
pub fn observation_vector(obs: &ObservationParams, layout: &ParamLayout) -> ModelResult<Array1<f64>> {
    check_observation(obs, layout)?;
    let mut out = Vec::with_capacity(layout.n_observation());
    if layout.include_choice {
        let choice = obs.choice.ok_or(ModelError::MissingChoiceParams)?;
        out.push(choice.bias);
        out.push(choice.lapse);
    }
    for neuron in obs.neurons.iter().flatten() {
        out.extend(neuron.values().iter());
    }
    Ok(Array1::from(out))
}

/// Split a flat vector back into named, validated blocks.
///
/// Errors
/// ------
/// - `ModelError::ThetaLengthMismatch` for a wrong length.
/// - `ModelError::NonFiniteTheta` for a non-finite entry.
/// - Latent/observation validation errors for out-of-domain values.
pub fn split_parameters(
    theta: ArrayView1<f64>, layout: &ParamLayout,
) -> ModelResult<(LatentParams, ObservationParams)> {
    if theta.len() != layout.n_params() {
        return Err(ModelError::ThetaLengthMismatch {
            expected: layout.n_params(),
            actual: theta.len(),
        });
    }
    if let Some((index, &value)) = theta.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(ModelError::NonFiniteTheta { index, value });
    }

    let latent = LatentParams::from_view(theta.slice(s![..N_LATENT]))?;
    let choice = if layout.include_choice {
        Some(ChoiceParams::new(theta[N_LATENT], theta[N_LATENT + 1])?)
    } else {
        None
    };
    let mut offset = layout.neuron_offset();
    let mut neurons = Vec::with_capacity(layout.n_sets());
    for set in &layout.links {
        let mut set_params = Vec::with_capacity(set.len());
        for &link in set {
            let width = link.n_params();
            let values = theta.slice(s![offset..offset + width]).to_vec();
            set_params.push(NeuronParams::new(link, values)?);
            offset += width;
        }
        neurons.push(set_params);
    }
    Ok((latent, ObservationParams { choice, neurons }))
}

fn check_observation(obs: &ObservationParams, layout: &ParamLayout) -> ModelResult<()> {
    if obs.neurons.len() != layout.n_sets() {
        return Err(ModelError::SetCountMismatch { expected: layout.n_sets(), found: obs.neurons.len() });
    }
    for (set, (params, links)) in obs.neurons.iter().zip(&layout.links).enumerate() {
        let matches = params.len() == links.len()
            && params.iter().zip(links).all(|(p, &l)| p.link() == l);
        if !matches {
            return Err(ModelError::NeuronLayoutMismatch {
                set,
                expected: links.len(),
                found: params.len(),
            });
        }
    }
    if layout.include_choice && obs.choice.is_none() {
        return Err(ModelError::MissingChoiceParams);
    }
    Ok(())
}

/// `ParamSpec` — bounds and free mask over the full flat vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub lower: Array1<f64>,
    pub upper: Array1<f64>,
    pub free: Vec<bool>,
}

impl ParamSpec {
    /// Errors
    /// ------
    /// - `ModelError::ThetaLengthMismatch` when the three inputs differ in
    ///   length.
    /// - `ModelError::InvalidBounds` when `lower[i] >= upper[i]` or either
    ///   bound is not finite.
    pub fn new(lower: Array1<f64>, upper: Array1<f64>, free: Vec<bool>) -> ModelResult<Self> {
        if upper.len() != lower.len() || free.len() != lower.len() {
            return Err(ModelError::ThetaLengthMismatch {
                expected: lower.len(),
                actual: upper.len().max(free.len()),
            });
        }
        for (index, (&lo, &hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(ModelError::InvalidBounds { index, lower: lo, upper: hi });
            }
        }
        Ok(ParamSpec { lower, upper, free })
    }

    /// Default bound table with every entry free.
    pub fn default_for(layout: &ParamLayout) -> Self {
        let mut lower: Vec<f64> = LATENT_LOWER.to_vec();
        let mut upper: Vec<f64> = LATENT_UPPER.to_vec();
        if layout.include_choice {
            lower.extend(CHOICE_LOWER);
            upper.extend(CHOICE_UPPER);
        }
        for link in layout.links.iter().flatten() {
            let (lo, hi) = link.default_bounds();
            lower.extend(lo);
            upper.extend(hi);
        }
        let n = lower.len();
        ParamSpec { lower: Array1::from(lower), upper: Array1::from(upper), free: vec![true; n] }
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Hold entry `index` fixed at the base value.
    pub fn fix(mut self, index: usize) -> Self {
        if let Some(flag) = self.free.get_mut(index) {
            *flag = false;
        }
        self
    }

    /// Hold every listed entry fixed.
    pub fn fix_all(self, indices: &[usize]) -> Self {
        indices.iter().fold(self, |spec, &i| spec.fix(i))
    }

    /// Free only the listed entries; everything else is fixed.
    pub fn free_only(mut self, indices: &[usize]) -> Self {
        self.free.iter_mut().for_each(|f| *f = false);
        for &i in indices {
            if let Some(flag) = self.free.get_mut(i) {
                *flag = true;
            }
        }
        self
    }

    /// Replace the bounds of entry `index`.
    pub fn with_bounds(mut self, index: usize, lower: f64, upper: f64) -> ModelResult<Self> {
        if index >= self.len() {
            return Err(ModelError::ThetaLengthMismatch { expected: self.len(), actual: index + 1 });
        }
        if !(lower.is_finite() && upper.is_finite() && lower < upper) {
            return Err(ModelError::InvalidBounds { index, lower, upper });
        }
        self.lower[index] = lower;
        self.upper[index] = upper;
        Ok(self)
    }

    pub fn free_indices(&self) -> Vec<usize> {
        self.free.iter().enumerate().filter(|(_, f)| **f).map(|(i, _)| i).collect()
    }

    pub fn n_free(&self) -> usize {
        self.free.iter().filter(|f| **f).count()
    }

    /// Check that `theta` has the right length and lies inside the bounds.
    pub fn check_within(&self, theta: ArrayView1<f64>) -> ModelResult<()> {
        if theta.len() != self.len() {
            return Err(ModelError::ThetaLengthMismatch { expected: self.len(), actual: theta.len() });
        }
        for (index, &value) in theta.iter().enumerate() {
            if !value.is_finite() {
                return Err(ModelError::NonFiniteTheta { index, value });
            }
            let (lower, upper) = (self.lower[index], self.upper[index]);
            if self.free[index] && !(lower..=upper).contains(&value) {
                return Err(ModelError::OutsideBounds { index, value, lower, upper });
            }
        }
        Ok(())
    }

    /// Full natural-units vector from free unconstrained coordinates `u`.
    pub fn to_full(&self, u: ArrayView1<f64>, base: ArrayView1<f64>) -> ModelResult<Array1<f64>> {
        if base.len() != self.len() {
            return Err(ModelError::ThetaLengthMismatch { expected: self.len(), actual: base.len() });
        }
        if u.len() != self.n_free() {
            return Err(ModelError::ThetaLengthMismatch { expected: self.n_free(), actual: u.len() });
        }
        let mut full = base.to_owned();
        for (&index, &ui) in self.free_indices().iter().zip(u.iter()) {
            if !ui.is_finite() {
                return Err(ModelError::NonFiniteTheta { index, value: ui });
            }
            full[index] = to_bounded(ui, self.lower[index], self.upper[index]);
        }
        Ok(full)
    }

    /// Free unconstrained coordinates for a full natural-units vector.
    pub fn to_unconstrained(&self, full: ArrayView1<f64>) -> ModelResult<Array1<f64>> {
        if full.len() != self.len() {
            return Err(ModelError::ThetaLengthMismatch { expected: self.len(), actual: full.len() });
        }
        Ok(self
            .free_indices()
            .into_iter()
            .map(|i| from_bounded(full[i], self.lower[i], self.upper[i]))
            .collect())
    }

    /// Free entries of `theta` within [`BOUND_TOL`] (relative to the bound
    /// width) of either bound.
    pub fn at_bounds(&self, theta: ArrayView1<f64>) -> Vec<usize> {
        self.free_indices()
            .into_iter()
            .filter(|&i| {
                let width = self.upper[i] - self.lower[i];
                (theta[i] - self.lower[i]).abs() <= BOUND_TOL * width
                    || (self.upper[i] - theta[i]).abs() <= BOUND_TOL * width
            })
            .collect()
    }
}
