//! One Newton step: direction, damping, update, classification.

use crate::descent::DescentDirection;
use crate::error::{NewtonError, NewtonResult};
use crate::estimator::{ConvergenceStatus, ErrorEstimator};
use crate::line_search::LineSearch;
use nalgebra::DVector;
use nl_core::{Mapping, Real, inf_norm};
use nl_lu::LuError;
use tracing::debug;

/// What happened during one iteration, for observers and logging.
#[derive(Clone, Debug)]
pub struct IterationRecord {
    /// Cumulative iteration number across hard resets.
    pub iteration: usize,
    /// Residual inf-norm after the step.
    pub residual_norm: Real,
    /// Relative step size of this iteration.
    pub relative_step: Real,
    /// Accepted line-search damping (0 when no progress was possible).
    pub alpha: Real,
    /// Residual evaluations spent probing the line search.
    pub probes: usize,
    /// Cumulative residual evaluations spent building Jacobians.
    pub evaluations: usize,
    pub status: ConvergenceStatus,
}

/// Composes a descent direction, a line search and an error estimator into a
/// single Newton iteration step.
pub struct IterationPerformer {
    descent: Box<dyn DescentDirection>,
    line_search: LineSearch,
    estimator: ErrorEstimator,
}

/// Failures that mean "this direction is numerically unusable", as opposed to
/// structural misuse: these classify the iteration as diverged so the outer
/// retry policy can react, instead of erroring out of the run.
fn is_numerical_failure(e: &NewtonError) -> bool {
    matches!(
        e,
        NewtonError::Lu(
            LuError::SingularPivot { .. }
                | LuError::DegenerateSecantUpdate { .. }
                | LuError::OrthogonalityError { .. }
        ) | NewtonError::Numeric { .. }
    )
}

impl IterationPerformer {
    pub fn new(
        descent: Box<dyn DescentDirection>,
        line_search: LineSearch,
        estimator: ErrorEstimator,
    ) -> Self {
        Self {
            descent,
            line_search,
            estimator,
        }
    }

    /// Restart iteration state from `x0`, optionally discarding all cached
    /// Jacobian/factorization state.
    pub fn reset(&mut self, x0: &DVector<Real>, hard: bool) {
        self.descent.reset(hard);
        self.estimator.reset();
        self.estimator.prime(x0);
    }

    pub fn hard_reset_may_help(&self) -> bool {
        self.descent.hard_reset_may_help()
    }

    /// Execute one iteration, advancing `x` in place on progress.
    pub fn perform(
        &mut self,
        mapping: &mut dyn Mapping,
        x: &mut DVector<Real>,
        iteration: usize,
    ) -> NewtonResult<IterationRecord> {
        let f0 = mapping.map(x)?;

        // Already at a root: no direction needed.
        if inf_norm(&f0) <= self.estimator.abs_tol() {
            self.estimator.set_current_solution(x, &f0);
            return Ok(self.record(iteration, 0.0, 0));
        }

        let direction = match self.descent.compute_direction(mapping, x, &f0, iteration) {
            Ok(d) => d,
            Err(e) if is_numerical_failure(&e) => {
                debug!(error = %e, "descent direction numerically unusable");
                self.descent.report_success(false);
                return Ok(self.diverged_record(iteration));
            }
            Err(e) => return Err(e),
        };

        let outcome = self.line_search.search(mapping, x, &f0, &direction)?;
        if outcome.alpha == 0.0 {
            self.descent.report_success(false);
            return Ok(self.diverged_record(iteration));
        }

        let x_new = &*x + &direction * outcome.alpha;
        self.estimator.set_current_solution(&x_new, &outcome.residual);
        let status = self.estimator.current_status();
        self.descent
            .report_success(status != ConvergenceStatus::Diverged);
        *x = x_new;

        Ok(IterationRecord {
            iteration,
            residual_norm: self.estimator.absolute_residual(),
            relative_step: self.estimator.relative_step(),
            alpha: outcome.alpha,
            probes: outcome.probes,
            evaluations: self.descent.evaluation_count(),
            status,
        })
    }

    fn record(&self, iteration: usize, alpha: Real, probes: usize) -> IterationRecord {
        IterationRecord {
            iteration,
            residual_norm: self.estimator.absolute_residual(),
            relative_step: self.estimator.relative_step(),
            alpha,
            probes,
            evaluations: self.descent.evaluation_count(),
            status: self.estimator.current_status(),
        }
    }

    fn diverged_record(&self, iteration: usize) -> IterationRecord {
        IterationRecord {
            iteration,
            residual_norm: self.estimator.absolute_residual(),
            relative_step: self.estimator.relative_step(),
            alpha: 0.0,
            probes: 0,
            evaluations: self.descent.evaluation_count(),
            status: ConvergenceStatus::Diverged,
        }
    }
}
