//! loglik_optimizer::builders — L-BFGS construction for each line search.
//!
//! The start point and iteration cap are applied at run time by
//! [`run_solver`](super::run::run_solver); only the history size and the
//! stopping tolerances are fixed here.
use argmin::solver::quasinewton::LBFGS;

use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        traits::MLEOptions,
        types::{
            Cost, DEFAULT_LBFGS_MEM, Grad, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente,
            MoreThuenteLS, Theta,
        },
    },
};

/// L-BFGS paired with More–Thuente, the default for accumulator fits.
pub fn lbfgs_more_thuente(opts: &MLEOptions) -> OptResult<LbfgsMoreThuente> {
    with_tolerances(LBFGS::new(MoreThuenteLS::new(), history_size(opts)), opts)
}

/// L-BFGS paired with Hager–Zhang.
pub fn lbfgs_hager_zhang(opts: &MLEOptions) -> OptResult<LbfgsHagerZhang> {
    with_tolerances(LBFGS::new(HagerZhangLS::new(), history_size(opts)), opts)
}

fn history_size(opts: &MLEOptions) -> usize {
    opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM)
}

/// Install whichever of `tol_grad` and `tol_cost` is set; argmin keeps its
/// own default for the other.
pub fn with_tolerances<L>(
    solver: LBFGS<L, Theta, Grad, Cost>, opts: &MLEOptions,
) -> OptResult<LBFGS<L, Theta, Grad, Cost>> {
    let solver = match opts.tols.tol_grad {
        Some(g) => solver.with_tolerance_grad(g)?,
        None => solver,
    };
    Ok(match opts.tols.tol_cost {
        Some(c) => solver.with_tolerance_cost(c)?,
        None => solver,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::loglik_optimizer::traits::{LineSearcher, Tolerances};

    #[test]
    // Purpose
    // -------
    // Each line search yields a solver for the default and an explicit
    // history size.
    //
    // Given
    // -----
    // - Gradient and cost tolerances with an iteration cap; memory `None`
    //   and `Some(11)`.
    //
    // Expect
    // ------
    // - Both constructors succeed and the default memory is 7.
    fn both_line_searches_build() {
        let tols = Tolerances::new(Some(1e-6), Some(1e-8), Some(50)).unwrap();
        for mem in [None, Some(11)] {
            let opts = MLEOptions::new(tols, LineSearcher::MoreThuente, false, mem).unwrap();
            assert_eq!(history_size(&opts), mem.unwrap_or(7));
            assert!(lbfgs_more_thuente(&opts).is_ok());
            assert!(lbfgs_hager_zhang(&opts).is_ok());
        }
    }

    #[test]
    // Purpose
    // -------
    // An iteration cap alone is enough to configure a solver.
    //
    // Given
    // -----
    // - Tolerances with only `max_iter`.
    //
    // Expect
    // ------
    // - `with_tolerances` returns `Ok`.
    fn iteration_cap_alone_configures() {
        let tols = Tolerances::new(None, None, Some(50)).unwrap();
        let opts = MLEOptions::new(tols, LineSearcher::MoreThuente, false, None).unwrap();
        let raw = LBFGS::new(MoreThuenteLS::new(), DEFAULT_LBFGS_MEM);

        assert!(with_tolerances(raw, &opts).is_ok());
    }
}
