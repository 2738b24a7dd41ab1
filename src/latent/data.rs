//! Trial data containers: click trains, binned click indices, trials, sets.
//!
//! Purpose
//! -------
//! Centralize input validation for behavioural and neural trial data so the
//! propagation and likelihood layers can assume clean inputs.
//!
//! Key behaviors
//! -------------
//! - [`ClickTrain`] enforces finite, non-negative, non-decreasing click times
//!   within each stream.
//! - [`Trial::new`] bins clicks once at construction for a given `dt` and
//!   rejects clicks falling after the trial end.
//! - [`TrialSet`] groups trials recorded together (same neurons);
//!   [`Dataset`] groups sets that share one time step.
//!
//! Conventions
//! -----------
//! - Click times are in seconds from stimulus onset.
//! - Time bin `t` covers `(t·dt, (t + 1)·dt]`. A click at time `τ` lands in
//!   bin `⌈τ/dt⌉ − 1`, with `τ = 0` in bin `0`. Ratios within
//!   [`BIN_ROUNDING_TOL`] of an integer are snapped first so that clicks
//!   placed on a bin edge do not drift into the next bin.
//! - `choice = Some(true)` means a rightward choice.
//! - Spike counts are a `(time bins × neurons)` matrix per trial.
use crate::latent::errors::{LatentError, LatentResult, Stream};
use ndarray::{Array1, Array2};

/// Relative tolerance used to snap `τ/dt` onto an integer before binning.
pub const BIN_ROUNDING_TOL: f64 = 1e-9;

/// Left and right click times of one trial.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickTrain {
    pub left: Array1<f64>,
    pub right: Array1<f64>,
}

impl ClickTrain {
    /// Validate and store the two click streams.
    ///
    /// Errors
    /// ------
    /// - `LatentError::InvalidClickTime` for a negative or non-finite time.
    /// - `LatentError::UnsortedClicks` when a stream decreases.
    pub fn new(left: Vec<f64>, right: Vec<f64>) -> LatentResult<Self> {
        let left = Array1::from(left);
        let right = Array1::from(right);
        validate_stream(&left, Stream::Left)?;
        validate_stream(&right, Stream::Right)?;
        Ok(ClickTrain { left, right })
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }

    pub fn len(&self) -> usize {
        self.left.len() + self.right.len()
    }
}

fn validate_stream(times: &Array1<f64>, stream: Stream) -> LatentResult<()> {
    let mut previous = 0.0;
    for (index, &time) in times.iter().enumerate() {
        if !(time.is_finite() && time >= 0.0) {
            return Err(LatentError::InvalidClickTime { stream, index, value: time });
        }
        if index > 0 && time < previous {
            return Err(LatentError::UnsortedClicks { stream, index, time, previous });
        }
        previous = time;
    }
    Ok(())
}

/// Time-bin index of every click, aligned with [`ClickTrain`].
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedClicks {
    pub left: Vec<usize>,
    pub right: Vec<usize>,
}

impl BinnedClicks {
    /// Every bin index must fall inside a trial of `n_time_bins` bins.
    ///
    /// Errors
    /// ------
    /// - `LatentError::BinOutOfRange` naming the first offending click.
    pub fn check(&self, n_time_bins: usize) -> LatentResult<()> {
        for (stream, bins) in [(Stream::Left, &self.left), (Stream::Right, &self.right)] {
            if let Some(index) = bins.iter().position(|&bin| bin >= n_time_bins) {
                return Err(LatentError::BinOutOfRange { stream, index, bin: bins[index], n_time_bins });
            }
        }
        Ok(())
    }
}

/// Time-bin index of a click at `time` for step `dt`.
pub fn click_bin(time: f64, dt: f64) -> usize {
    let ratio = time / dt;
    let nearest = ratio.round();
    let ratio = if (ratio - nearest).abs() <= BIN_ROUNDING_TOL * nearest.max(1.0) {
        nearest
    } else {
        ratio
    };
    (ratio.ceil() as usize).saturating_sub(1)
}

fn bin_stream(
    times: &Array1<f64>, dt: f64, n_time_bins: usize, stream: Stream,
) -> LatentResult<Vec<usize>> {
    times
        .iter()
        .enumerate()
        .map(|(index, &time)| {
            let bin = click_bin(time, dt);
            if bin >= n_time_bins {
                return Err(LatentError::ClickOutsideTrial {
                    stream,
                    index,
                    time,
                    duration: n_time_bins as f64 * dt,
                });
            }
            Ok(bin)
        })
        .collect()
}

/// `Trial` — one stimulus presentation with its observations.
///
/// Fields
/// ------
/// - `clicks`: validated click streams.
/// - `binned`: time bin of every click for `dt`, computed once.
/// - `n_time_bins`: number of `dt` bins spanned by the trial (`>= 1`).
/// - `dt`: time step the clicks were binned with.
/// - `choice`: observed choice, `Some(true)` for right.
/// - `spikes`: optional `(n_time_bins × n_neurons)` spike counts.
/// - `initial_offset`: optional shift of the initial accumulator mean, e.g.
///   derived from trial history.
///
/// Invariants
/// ----------
/// - Every entry of `binned` is `< n_time_bins`.
/// - `spikes`, when present, has exactly `n_time_bins` rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub clicks: ClickTrain,
    pub binned: BinnedClicks,
    pub n_time_bins: usize,
    pub dt: f64,
    pub choice: Option<bool>,
    pub spikes: Option<Array2<u32>>,
    pub initial_offset: Option<f64>,
}

impl Trial {
    /// Build a trial of `n_time_bins` bins of width `dt` and bin its clicks.
    ///
    /// Errors
    /// ------
    /// - `LatentError::EmptyTrial` when `n_time_bins == 0`.
    /// - `LatentError::InvalidTimeStep` when `dt` is not finite and positive.
    /// - `LatentError::ClickOutsideTrial` for a click after `n_time_bins · dt`.
    pub fn new(clicks: ClickTrain, n_time_bins: usize, dt: f64) -> LatentResult<Self> {
        if n_time_bins == 0 {
            return Err(LatentError::EmptyTrial);
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(LatentError::InvalidTimeStep { dt });
        }
        let binned = BinnedClicks {
            left: bin_stream(&clicks.left, dt, n_time_bins, Stream::Left)?,
            right: bin_stream(&clicks.right, dt, n_time_bins, Stream::Right)?,
        };
        Ok(Trial {
            clicks,
            binned,
            n_time_bins,
            dt,
            choice: None,
            spikes: None,
            initial_offset: None,
        })
    }

    /// Build a trial whose duration in seconds is rounded up to whole bins.
    pub fn from_duration(clicks: ClickTrain, duration: f64, dt: f64) -> LatentResult<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(LatentError::InvalidTimeStep { dt });
        }
        if !(duration.is_finite() && duration > 0.0) {
            return Err(LatentError::EmptyTrial);
        }
        Trial::new(clicks, click_bin(duration, dt) + 1, dt)
    }

    pub fn with_choice(mut self, right: bool) -> Self {
        self.choice = Some(right);
        self
    }

    pub fn with_spikes(mut self, spikes: Array2<u32>) -> LatentResult<Self> {
        if spikes.nrows() != self.n_time_bins {
            return Err(LatentError::SpikeShapeMismatch {
                expected: (self.n_time_bins, spikes.ncols()),
                found: spikes.dim(),
            });
        }
        self.spikes = Some(spikes);
        Ok(self)
    }

    pub fn with_initial_offset(mut self, offset: f64) -> LatentResult<Self> {
        if !offset.is_finite() {
            return Err(LatentError::InvalidInitialOffset { value: offset });
        }
        self.initial_offset = Some(offset);
        Ok(self)
    }

    pub fn n_neurons(&self) -> usize {
        self.spikes.as_ref().map_or(0, |s| s.ncols())
    }
}

/// Trials recorded together; every trial carries the same neurons.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSet {
    pub trials: Vec<Trial>,
    pub n_neurons: usize,
}

impl TrialSet {
    /// Group trials, checking they agree on the neuron count.
    ///
    /// The neuron count is taken from the first trial. An empty set has zero
    /// neurons.
    pub fn new(trials: Vec<Trial>) -> LatentResult<Self> {
        let n_neurons = trials.first().map_or(0, Trial::n_neurons);
        for trial in &trials {
            let found = trial.n_neurons();
            if found != n_neurons {
                return Err(LatentError::NeuronCountMismatch { expected: n_neurons, found });
            }
            if n_neurons > 0 && trial.spikes.is_none() {
                return Err(LatentError::NeuronCountMismatch { expected: n_neurons, found: 0 });
            }
        }
        Ok(TrialSet { trials, n_neurons })
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }
}

/// All trial sets of a fit; every trial shares the time step `dt`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub sets: Vec<TrialSet>,
    pub dt: f64,
}

impl Dataset {
    pub fn new(sets: Vec<TrialSet>, dt: f64) -> LatentResult<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(LatentError::InvalidTimeStep { dt });
        }
        for trial in sets.iter().flat_map(|set| set.trials.iter()) {
            if trial.dt != dt {
                return Err(LatentError::TimeStepMismatch { expected: dt, found: trial.dt });
            }
        }
        Ok(Dataset { sets, dt })
    }

    pub fn n_trials(&self) -> usize {
        self.sets.iter().map(TrialSet::len).sum()
    }

    /// Neuron count of every set, in set order.
    pub fn neurons_per_set(&self) -> Vec<usize> {
        self.sets.iter().map(|set| set.n_neurons).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    // Purpose
    // -------
    // Clicks land in the bin whose right edge they reach.
    //
    // Given
    // -----
    // - dt = 0.01 and clicks at 0, 0.005, 0.01 (edge), 0.0100000000001, 0.03.
    //
    // Expect
    // ------
    // - Bins 0, 0, 0, 1, 2: an edge click belongs to the bin it closes and
    //   onset clicks fall in bin 0.
    fn click_bin_assigns_edges_to_the_closing_bin() {
        let dt = 0.01;

        let bins: Vec<usize> =
            [0.0, 0.005, 0.01, 0.010_000_01, 0.03].iter().map(|&t| click_bin(t, dt)).collect();

        assert_eq!(bins, vec![0, 0, 0, 1, 2]);
    }

    #[test]
    // Purpose
    // -------
    // Trial construction bins both streams and rejects late clicks.
    //
    // Given
    // -----
    // - 5 bins of 10 ms, clicks inside and one at 60 ms.
    //
    // Expect
    // ------
    // - Binned indices for the valid trial; `ClickOutsideTrial` otherwise.
    fn trial_bins_clicks_and_rejects_clicks_after_the_end() {
        let clicks = ClickTrain::new(vec![0.0, 0.012], vec![0.049]).unwrap();
        let trial = Trial::new(clicks, 5, 0.01).unwrap();
        assert_eq!(trial.binned.left, vec![0, 1]);
        assert_eq!(trial.binned.right, vec![4]);

        let late = ClickTrain::new(vec![], vec![0.06]).unwrap();
        assert!(matches!(
            Trial::new(late, 5, 0.01),
            Err(LatentError::ClickOutsideTrial { stream: Stream::Right, index: 0, .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Click trains must be ordered and non-negative within each stream.
    //
    // Given
    // -----
    // - A decreasing left stream and a negative right click.
    //
    // Expect
    // ------
    // - `UnsortedClicks` pointing at the second left click and
    //   `InvalidClickTime` for the right one.
    fn click_train_rejects_unsorted_or_negative_times() {
        assert!(matches!(
            ClickTrain::new(vec![0.2, 0.1], vec![]),
            Err(LatentError::UnsortedClicks { stream: Stream::Left, index: 1, .. })
        ));
        assert!(matches!(
            ClickTrain::new(vec![], vec![-0.1]),
            Err(LatentError::InvalidClickTime { stream: Stream::Right, index: 0, .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Sets reject trials with mismatched neuron counts and spike shapes.
    //
    // Given
    // -----
    // - One trial with 2 neurons and one with 3; a spike matrix with the
    //   wrong number of rows.
    //
    // Expect
    // ------
    // - `NeuronCountMismatch` and `SpikeShapeMismatch` respectively.
    fn trial_set_checks_spike_layout() {
        let clicks = ClickTrain::new(vec![], vec![]).unwrap();
        let a = Trial::new(clicks.clone(), 4, 0.01)
            .unwrap()
            .with_spikes(Array2::zeros((4, 2)))
            .unwrap();
        let b = Trial::new(clicks.clone(), 4, 0.01)
            .unwrap()
            .with_spikes(Array2::zeros((4, 3)))
            .unwrap();
        assert!(matches!(
            TrialSet::new(vec![a, b]),
            Err(LatentError::NeuronCountMismatch { expected: 2, found: 3 })
        ));

        let short = Trial::new(clicks, 4, 0.01).unwrap().with_spikes(Array2::zeros((3, 2)));
        assert!(matches!(short, Err(LatentError::SpikeShapeMismatch { .. })));
    }

    #[test]
    // Purpose
    // -------
    // A duration in seconds maps to whole bins.
    //
    // Given
    // -----
    // - duration 0.5 s and 0.505 s with dt = 0.01.
    //
    // Expect
    // ------
    // - 50 and 51 bins respectively.
    fn trial_from_duration_rounds_up_to_whole_bins() {
        let clicks = ClickTrain::new(vec![], vec![]).unwrap();

        assert_eq!(Trial::from_duration(clicks.clone(), 0.5, 0.01).unwrap().n_time_bins, 50);
        assert_eq!(Trial::from_duration(clicks, 0.505, 0.01).unwrap().n_time_bins, 51);
    }
}
