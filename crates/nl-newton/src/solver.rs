//! Outer Newton driver: iteration budget, observers, hard-reset retry.

use crate::error::NewtonResult;
use crate::estimator::ConvergenceStatus;
use crate::iteration::{IterationPerformer, IterationRecord};
use crate::options::NewtonOptions;
use nalgebra::DVector;
use nl_core::{Mapping, Real};
use tracing::debug;

/// Terminal outcome of one [`NewtonSolver::run`] call.
///
/// Failing to converge is an expected, recoverable result for a stiff or
/// ill-conditioned step; callers such as an adaptive step controller react by
/// shrinking the step and retrying. Only structural misuse is an `Err`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Converged,
    Diverged,
    /// An observer requested termination; distinct from numerical divergence.
    Terminated,
    IterationCountLimitExceeded,
}

/// Per-iteration reporting and cooperative cancellation.
pub trait SolveObserver {
    /// Called after every iteration with the finished record.
    fn iteration_finished(&mut self, _record: &IterationRecord) {}

    /// Polled once per iteration; returning true aborts the run.
    fn should_terminate(&mut self, _iteration: usize, _x: &DVector<Real>) -> bool {
        false
    }
}

/// Hook consulted whenever a run would end in convergence or divergence; the
/// strategy may request another pass, typically after adjusting a
/// regularization parameter on the problem.
pub trait RegularizationStrategy {
    fn request_another_pass(&mut self, status: ConvergenceStatus, x: &DVector<Real>) -> bool;
}

pub struct NewtonSolver {
    performer: IterationPerformer,
    max_iterations: usize,
    x: DVector<Real>,
    observers: Vec<Box<dyn SolveObserver>>,
    regularization: Option<Box<dyn RegularizationStrategy>>,
}

impl NewtonSolver {
    pub fn new(performer: IterationPerformer, options: &NewtonOptions) -> Self {
        Self {
            performer,
            max_iterations: options.max_iterations,
            x: DVector::zeros(0),
            observers: Vec::new(),
            regularization: None,
        }
    }

    /// Build a solver from options alone, resolving the descent strategy and
    /// trimmer through the default registry.
    pub fn from_options(options: &NewtonOptions) -> NewtonResult<Self> {
        let performer = crate::registry::DescentRegistry::with_defaults().performer(options)?;
        Ok(Self::new(performer, options))
    }

    pub fn add_observer(&mut self, observer: Box<dyn SolveObserver>) {
        self.observers.push(observer);
    }

    pub fn set_regularization(&mut self, strategy: Box<dyn RegularizationStrategy>) {
        self.regularization = Some(strategy);
    }

    /// Install the starting point, optionally discarding all cached state.
    pub fn set_initial_guess(&mut self, x: DVector<Real>, hard_reset: bool) {
        self.performer.reset(&x, hard_reset);
        self.x = x;
    }

    pub fn current_solution(&self) -> &DVector<Real> {
        &self.x
    }

    /// Iterate until convergence, divergence, termination or budget
    /// exhaustion.
    ///
    /// On divergence the descent strategy is reset hard and the per-run
    /// budget restarted once, provided the strategy reports that a fresh
    /// start could help; a second divergence is terminal. Iteration
    /// numbering stays cumulative across the reset for observer purposes.
    pub fn run(&mut self, mapping: &mut dyn Mapping) -> NewtonResult<RunOutcome> {
        let n = mapping.square_size()?;
        if self.x.len() != n {
            return Err(nl_core::CoreError::SizeMismatch {
                what: "initial guess",
                expected: n,
                found: self.x.len(),
            }
            .into());
        }

        let mut hard_reset_tried = false;
        let mut since_reset = 0usize;
        let mut iteration = 0usize;
        loop {
            if since_reset >= self.max_iterations {
                return Ok(RunOutcome::IterationCountLimitExceeded);
            }

            let record = self.performer.perform(mapping, &mut self.x, iteration)?;
            iteration += 1;
            since_reset += 1;
            debug!(
                iteration,
                residual = record.residual_norm,
                alpha = record.alpha,
                status = ?record.status,
                "newton iteration"
            );

            let mut terminate = false;
            for observer in &mut self.observers {
                observer.iteration_finished(&record);
                if observer.should_terminate(iteration, &self.x) {
                    terminate = true;
                }
            }
            if terminate {
                return Ok(RunOutcome::Terminated);
            }

            match record.status {
                ConvergenceStatus::Converged => {
                    if self.regularization_wants_more(ConvergenceStatus::Converged) {
                        continue;
                    }
                    return Ok(RunOutcome::Converged);
                }
                ConvergenceStatus::Diverged => {
                    if self.regularization_wants_more(ConvergenceStatus::Diverged) {
                        continue;
                    }
                    if !hard_reset_tried && self.performer.hard_reset_may_help() {
                        debug!(iteration, "hard reset after divergence");
                        self.performer.reset(&self.x, true);
                        hard_reset_tried = true;
                        since_reset = 0;
                        continue;
                    }
                    return Ok(RunOutcome::Diverged);
                }
                ConvergenceStatus::ContinueIterations => {}
            }
        }
    }

    fn regularization_wants_more(&mut self, status: ConvergenceStatus) -> bool {
        match &mut self.regularization {
            Some(strategy) => strategy.request_another_pass(status, &self.x),
            None => false,
        }
    }
}
