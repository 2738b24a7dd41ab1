//! Forward filtering, backward smoothing, and posteriors over the latent grid.
//!
//! Purpose
//! -------
//! Propagate the accumulator distribution through a trial with the
//! transition matrices of [`crate::latent::transition`], optionally
//! conditioning on per-bin emission likelihoods (spike counts) and a terminal
//! likelihood (the choice).
//!
//! Key behaviors
//! -------------
//! - [`Propagator::new`] builds the grid and the shared click-free matrix once
//!   per parameter vector; every trial reuses them read-only.
//! - [`Propagator::forward`] returns the log-likelihood of the emissions,
//!   accumulated as `Σ_t (ln c_t + s_t)`. `s_t` is the max log-emission of bin
//!   `t`, subtracted before exponentiating, and `c_t` the mass left after
//!   weighting.
//! - [`Propagator::backward`] runs the scaled backward recursion
//!   `β_{t−1} = F_tᵀ(ẽ_t ⊙ β_t) / c_t` from a terminal vector.
//! - [`Propagator::posterior`] combines both into `γ_t ∝ α_t ⊙ β_t`.
//!
//! Invariants & assumptions
//! ------------------------
//! - After every step the filtered distribution sums to `1`.
//! - A normalizer that is zero, negative, or non-finite aborts the pass with
//!   [`LatentError::DegenerateNormalizer`]; no partial likelihood is returned.
//! - Log-emission matrices are `(T × n)`, one row per time bin.
use crate::latent::{
    clicks::BinInput,
    errors::{LatentError, LatentResult},
    grid::LatentGrid,
    params::LatentParams,
    transition::{no_click_matrix, step_variance, transition_matrix},
    workspace::TrialWorkspace,
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip, linalg::general_mat_vec_mul};

/// Result of a forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardOutcome {
    /// `Σ_t ln(c_t) + s_t`; `0` (up to rounding) without emissions.
    pub log_likelihood: f64,
    /// Mass `c_t` remaining after emission weighting in each bin.
    pub normalizers: Vec<f64>,
    /// Max-shift `s_t` applied to the log-emissions of each bin.
    pub shifts: Vec<f64>,
    /// Filtered distribution after the last bin.
    pub final_distribution: Array1<f64>,
}

impl ForwardOutcome {
    /// Per-bin log normalizers `ln c_t + s_t`.
    pub fn log_normalizers(&self) -> Array1<f64> {
        self.normalizers.iter().zip(&self.shifts).map(|(c, s)| c.ln() + s).collect()
    }
}

/// Shared, read-only propagation state for one parameter vector.
#[derive(Debug, Clone)]
pub struct Propagator {
    pub params: LatentParams,
    pub grid: LatentGrid,
    pub no_click: Array2<f64>,
    pub dt: f64,
}

impl Propagator {
    /// Build the grid and click-free transition matrix for `params`.
    ///
    /// Errors
    /// ------
    /// - Grid errors for an invalid `n_bins`; `InvalidTimeStep` for `dt`.
    pub fn new(params: LatentParams, n_bins: usize, dt: f64) -> LatentResult<Self> {
        let grid = LatentGrid::new(params.bound, n_bins)?;
        let no_click = no_click_matrix(&params, &grid, dt)?;
        Ok(Propagator { params, grid, no_click, dt })
    }

    pub fn n_bins(&self) -> usize {
        self.grid.n_bins()
    }

    /// Write the initial distribution into `ws.p`.
    ///
    /// A point mass at the centre bin is pushed through one transition with
    /// variance `σ²_i`, no leak, and an optional mean shift `offset`.
    pub fn initial_distribution(&self, offset: Option<f64>, ws: &mut TrialWorkspace) -> LatentResult<()> {
        ws.check(self.n_bins())?;
        let shift = offset.unwrap_or(0.0);
        transition_matrix(&mut ws.f, 0.0, self.params.sigma2_i, shift / self.dt, &self.grid, self.dt)?;
        ws.p.assign(&ws.f.column(self.grid.center_index()));
        Ok(())
    }

    /// Fill `ws.f` for a bin with clicks; click-free bins use `self.no_click`.
    fn load_transition(&self, input: &BinInput, ws: &mut TrialWorkspace) -> LatentResult<()> {
        let variance = step_variance(&self.params, self.dt, input.magnitude);
        // net input is a jump of ΣR − ΣL over one step
        transition_matrix(
            &mut ws.f,
            self.params.lambda,
            variance,
            input.net / self.dt,
            &self.grid,
            self.dt,
        )
    }

    /// Advance `ws.p` by one time bin.
    fn step(&self, input: &BinInput, ws: &mut TrialWorkspace) -> LatentResult<()> {
        if input.count == 0 {
            general_mat_vec_mul(1.0, &self.no_click, &ws.p, 0.0, &mut ws.scratch);
        } else {
            self.load_transition(input, ws)?;
            general_mat_vec_mul(1.0, &ws.f, &ws.p, 0.0, &mut ws.scratch);
        }
        std::mem::swap(&mut ws.p, &mut ws.scratch);
        Ok(())
    }

    /// Filter the trial forward.
    ///
    /// Parameters
    /// ----------
    /// - `inputs`: per-bin click input, one entry per time bin.
    /// - `log_emissions`: optional `(T × n)` log-likelihoods of each bin's
    ///   observations given each latent bin.
    /// - `offset`: optional initial mean shift.
    /// - `ws`: scratch buffers; `ws.p` holds the final distribution on return.
    /// - `filtered`: optional `(T × n)` buffer receiving every filtered
    ///   distribution.
    ///
    /// Errors
    /// ------
    /// - `LatentError::EmissionLengthMismatch` for mis-shaped emissions.
    /// - `LatentError::RecordShapeMismatch` for a mis-shaped `filtered`.
    /// - `LatentError::DegenerateNormalizer` when the mass vanishes.
    pub fn forward(
        &self, inputs: &[BinInput], log_emissions: Option<ArrayView2<f64>>, offset: Option<f64>,
        ws: &mut TrialWorkspace, mut filtered: Option<&mut Array2<f64>>,
    ) -> LatentResult<ForwardOutcome> {
        self.check_emissions(inputs.len(), log_emissions)?;
        if let Some(record) = filtered.as_deref() {
            let expected = (inputs.len(), self.n_bins());
            if record.dim() != expected {
                return Err(LatentError::RecordShapeMismatch { expected, found: record.dim() });
            }
        }
        self.initial_distribution(offset, ws)?;

        let mut log_likelihood = 0.0;
        let mut normalizers = Vec::with_capacity(inputs.len());
        let mut shifts = Vec::with_capacity(inputs.len());
        for (t, input) in inputs.iter().enumerate() {
            self.step(input, ws)?;
            let shift = match log_emissions {
                Some(le) => weight_by_emission(&mut ws.p, le.row(t)),
                None => 0.0,
            };
            let c = ws.p.sum();
            if !(c > 0.0 && c.is_finite()) {
                return Err(LatentError::DegenerateNormalizer { bin: t, value: c });
            }
            ws.p.mapv_inplace(|v| v / c);
            log_likelihood += c.ln() + shift;
            normalizers.push(c);
            shifts.push(shift);
            if let Some(record) = filtered.as_mut() {
                record.row_mut(t).assign(&ws.p);
            }
        }

        Ok(ForwardOutcome {
            log_likelihood,
            normalizers,
            shifts,
            final_distribution: ws.p.clone(),
        })
    }

    /// Run the scaled backward recursion.
    ///
    /// `forward` must come from [`Propagator::forward`] on the same inputs and
    /// emissions. `terminal` is the likelihood of the end-of-trial
    /// observation per bin (all ones when absent). Returns `(T × n)` backward
    /// messages.
    pub fn backward(
        &self, inputs: &[BinInput], log_emissions: Option<ArrayView2<f64>>,
        forward: &ForwardOutcome, terminal: Option<ArrayView1<f64>>, ws: &mut TrialWorkspace,
    ) -> LatentResult<Array2<f64>> {
        let n = self.n_bins();
        let n_time = inputs.len();
        ws.check(n)?;
        self.check_emissions(n_time, log_emissions)?;
        if forward.normalizers.len() != n_time {
            return Err(LatentError::EmissionLengthMismatch {
                expected: n_time,
                found: forward.normalizers.len(),
            });
        }

        let mut betas = Array2::<f64>::zeros((n_time, n));
        if n_time == 0 {
            return Ok(betas);
        }
        let mut beta = match terminal {
            Some(v) if v.len() == n => v.to_owned(),
            Some(v) => return Err(LatentError::BufferSizeMismatch { expected: n, found: v.len() }),
            None => Array1::ones(n),
        };
        betas.row_mut(n_time - 1).assign(&beta);

        for t in (1..n_time).rev() {
            ws.weighted.assign(&beta);
            if let Some(le) = log_emissions {
                let shift = forward.shifts[t];
                Zip::from(&mut ws.weighted).and(le.row(t)).for_each(|w, &l| *w *= (l - shift).exp());
            }
            let c = forward.normalizers[t];
            if inputs[t].count == 0 {
                general_mat_vec_mul(1.0 / c, &self.no_click.t(), &ws.weighted, 0.0, &mut ws.scratch);
            } else {
                self.load_transition(&inputs[t], ws)?;
                general_mat_vec_mul(1.0 / c, &ws.f.t(), &ws.weighted, 0.0, &mut ws.scratch);
            }
            beta.assign(&ws.scratch);
            betas.row_mut(t - 1).assign(&beta);
        }
        Ok(betas)
    }

    /// Smoothed posterior over bins for every time bin, `(T × n)`.
    ///
    /// Each row sums to `1`. With `terminal` set, the posterior is also
    /// conditioned on the end-of-trial observation.
    pub fn posterior(
        &self, inputs: &[BinInput], log_emissions: Option<ArrayView2<f64>>, offset: Option<f64>,
        terminal: Option<ArrayView1<f64>>, ws: &mut TrialWorkspace,
    ) -> LatentResult<Array2<f64>> {
        let mut alphas = Array2::<f64>::zeros((inputs.len(), self.n_bins()));
        let forward = self.forward(inputs, log_emissions, offset, ws, Some(&mut alphas))?;
        let betas = self.backward(inputs, log_emissions, &forward, terminal, ws)?;

        let mut gamma = alphas * &betas;
        for (t, mut row) in gamma.rows_mut().into_iter().enumerate() {
            let mass = row.sum();
            if !(mass > 0.0 && mass.is_finite()) {
                return Err(LatentError::DegenerateNormalizer { bin: t, value: mass });
            }
            row.mapv_inplace(|v| v / mass);
        }
        Ok(gamma)
    }

    fn check_emissions(&self, n_time: usize, log_emissions: Option<ArrayView2<f64>>) -> LatentResult<()> {
        if let Some(le) = log_emissions {
            if le.nrows() != n_time {
                return Err(LatentError::EmissionLengthMismatch { expected: n_time, found: le.nrows() });
            }
            if le.ncols() != self.n_bins() {
                return Err(LatentError::BufferSizeMismatch {
                    expected: self.n_bins(),
                    found: le.ncols(),
                });
            }
        }
        Ok(())
    }
}

/// Multiply `p` by `exp(le − max(le))` in place and return the shift.
fn weight_by_emission(p: &mut Array1<f64>, le: ArrayView1<f64>) -> f64 {
    let shift = le.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    Zip::from(p).and(le).for_each(|pj, &l| *pj *= (l - shift).exp());
    shift
}
