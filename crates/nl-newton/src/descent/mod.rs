//! Descent-direction strategies.
//!
//! Every strategy answers "given the current point and residual, what is the
//! next search direction?" with `-(approximate Jacobian)^-1 * f0`, differing
//! only in how fresh the approximation is kept and what an update costs. The
//! decision to retry with a completely fresh Jacobian after divergence stays
//! with the outer solver, which consults `hard_reset_may_help`.

mod broyden;
mod constant;
mod fake_broyden;
mod hart;
mod lazy_fake_broyden;
mod simple;

pub use broyden::Broyden;
pub use constant::ConstantJacobian;
pub use fake_broyden::FakeBroyden;
pub use hart::Hart;
pub use lazy_fake_broyden::LazyFakeBroyden;
pub use simple::SimpleNewton;

use crate::error::NewtonResult;
use nalgebra::DVector;
use nl_core::{Mapping, Real};

pub trait DescentDirection {
    /// Forget previous-step memory; with `hard` also discard any cached
    /// sparsity pattern so the next direction rebuilds from scratch.
    fn reset(&mut self, hard: bool);

    /// Whether a hard reset could improve matters after divergence.
    fn hard_reset_may_help(&self) -> bool;

    /// Compute the next search direction at `x0` with residual `f0`.
    fn compute_direction(
        &mut self,
        mapping: &mut dyn Mapping,
        x0: &DVector<Real>,
        f0: &DVector<Real>,
        iteration: usize,
    ) -> NewtonResult<DVector<Real>>;

    /// Feedback about the step taken with the last direction.
    fn report_success(&mut self, success: bool);

    /// Residual evaluations spent building Jacobians so far.
    fn evaluation_count(&self) -> usize;
}

/// Previous-point bookkeeping shared by the secant-updating strategies.
#[derive(Clone, Debug, Default)]
pub(crate) struct StepMemory {
    prev_x: Option<DVector<Real>>,
    prev_f: Option<DVector<Real>>,
}

impl StepMemory {
    pub fn clear(&mut self) {
        self.prev_x = None;
        self.prev_f = None;
    }

    /// Returns the step `s = x0 - prev_x` and residual change `y = f0 -
    /// prev_f` since the last call, then records the new point. `None` on the
    /// first call after a clear.
    pub fn advance(
        &mut self,
        x0: &DVector<Real>,
        f0: &DVector<Real>,
    ) -> Option<(DVector<Real>, DVector<Real>)> {
        let step = match (&self.prev_x, &self.prev_f) {
            (Some(px), Some(pf)) => Some((x0 - px, f0 - pf)),
            _ => None,
        };
        self.prev_x = Some(x0.clone());
        self.prev_f = Some(f0.clone());
        step
    }
}
