//! Convergence/divergence classification of Newton iterates.

use crate::options::NewtonOptions;
use nalgebra::DVector;
use nl_core::{Real, inf_norm};

/// Classification of the current iterate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvergenceStatus {
    Converged,
    ContinueIterations,
    Diverged,
}

/// Tracks relative step size and absolute residual across iterations.
///
/// Converged requires both the residual inf-norm below `abs_tol` and the
/// relative step below `rel_tol`; either quantity beyond `divergence_limit`
/// classifies as diverged; anything else continues.
#[derive(Clone, Debug)]
pub struct ErrorEstimator {
    abs_tol: Real,
    rel_tol: Real,
    divergence_limit: Real,
    prev_x: Option<DVector<Real>>,
    relative_step: Real,
    absolute_residual: Real,
    evaluated: bool,
}

impl ErrorEstimator {
    pub fn new(abs_tol: Real, rel_tol: Real, divergence_limit: Real) -> Self {
        Self {
            abs_tol,
            rel_tol,
            divergence_limit,
            prev_x: None,
            relative_step: 0.0,
            absolute_residual: 0.0,
            evaluated: false,
        }
    }

    pub fn from_options(options: &NewtonOptions) -> Self {
        Self::new(options.abs_tol, options.rel_tol, options.divergence_limit)
    }

    pub fn abs_tol(&self) -> Real {
        self.abs_tol
    }

    /// Forget all history; the next status is `ContinueIterations` until a
    /// solution is recorded.
    pub fn reset(&mut self) {
        self.prev_x = None;
        self.relative_step = 0.0;
        self.absolute_residual = 0.0;
        self.evaluated = false;
    }

    /// Seed the previous iterate so the first recorded step is measured
    /// against the initial guess.
    pub fn prime(&mut self, x0: &DVector<Real>) {
        self.prev_x = Some(x0.clone());
        self.evaluated = false;
    }

    /// Record the iterate reached by the latest step and its residual.
    pub fn set_current_solution(&mut self, x: &DVector<Real>, residual: &DVector<Real>) {
        self.relative_step = match &self.prev_x {
            Some(prev) => {
                let denom = inf_norm(prev);
                if denom == 0.0 {
                    0.0
                } else {
                    inf_norm(&(x - prev)) / denom
                }
            }
            None => 0.0,
        };
        self.absolute_residual = if residual.iter().all(|v| v.is_finite()) {
            inf_norm(residual)
        } else {
            Real::INFINITY
        };
        self.prev_x = Some(x.clone());
        self.evaluated = true;
    }

    pub fn relative_step(&self) -> Real {
        self.relative_step
    }

    pub fn absolute_residual(&self) -> Real {
        self.absolute_residual
    }

    pub fn current_status(&self) -> ConvergenceStatus {
        if !self.evaluated {
            return ConvergenceStatus::ContinueIterations;
        }
        if self.absolute_residual <= self.abs_tol && self.relative_step <= self.rel_tol {
            ConvergenceStatus::Converged
        } else if self.absolute_residual > self.divergence_limit
            || self.relative_step > self.divergence_limit
        {
            ConvergenceStatus::Diverged
        } else {
            ConvergenceStatus::ContinueIterations
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(values: &[Real]) -> DVector<Real> {
        DVector::from_vec(values.to_vec())
    }

    #[test]
    fn converges_when_both_criteria_hold() {
        let mut est = ErrorEstimator::new(1e-6, 1e-6, 1e8);
        est.prime(&v(&[1.0, 1.0]));
        est.set_current_solution(&v(&[1.0 + 1e-8, 1.0]), &v(&[1e-8, 0.0]));
        assert_eq!(est.current_status(), ConvergenceStatus::Converged);
    }

    #[test]
    fn small_residual_alone_is_not_enough() {
        let mut est = ErrorEstimator::new(1e-6, 1e-6, 1e8);
        est.prime(&v(&[1.0]));
        est.set_current_solution(&v(&[2.0]), &v(&[1e-9]));
        assert_eq!(est.current_status(), ConvergenceStatus::ContinueIterations);
    }

    #[test]
    fn zero_previous_iterate_means_zero_relative_step() {
        let mut est = ErrorEstimator::new(1e-6, 1e-6, 1e8);
        est.prime(&v(&[0.0, 0.0]));
        est.set_current_solution(&v(&[5.0, -3.0]), &v(&[1e-9, 0.0]));
        assert_eq!(est.relative_step(), 0.0);
        assert_eq!(est.current_status(), ConvergenceStatus::Converged);
    }

    #[test]
    fn huge_residual_diverges() {
        let mut est = ErrorEstimator::new(1e-6, 1e-6, 1e8);
        est.prime(&v(&[1.0]));
        est.set_current_solution(&v(&[1.5]), &v(&[1e9]));
        assert_eq!(est.current_status(), ConvergenceStatus::Diverged);
    }

    #[test]
    fn non_finite_residual_diverges() {
        let mut est = ErrorEstimator::new(1e-6, 1e-6, 1e8);
        est.prime(&v(&[1.0]));
        est.set_current_solution(&v(&[1.5]), &v(&[Real::NAN]));
        assert_eq!(est.current_status(), ConvergenceStatus::Diverged);
    }

    #[test]
    fn unevaluated_estimator_continues() {
        let est = ErrorEstimator::new(1e-6, 1e-6, 1e8);
        assert_eq!(est.current_status(), ConvergenceStatus::ContinueIterations);
    }
}
