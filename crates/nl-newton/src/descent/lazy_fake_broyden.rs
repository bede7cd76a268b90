//! Lazily applied sparsity-preserving Broyden update.
//!
//! Corrections are accumulated in the provider's Jacobian every iteration,
//! but the factorization is only refreshed once every `lazy_iterations`
//! corrections, amortizing the refactorization over several Newton steps at
//! the price of solving with a stale factorization in between.
//! `report_success` escalates on failed steps: first flush the buffered
//! corrections into the factorization, then force a full recompute.

use crate::descent::fake_broyden::pattern_restricted_update;
use crate::descent::{DescentDirection, StepMemory};
use crate::error::NewtonResult;
use nalgebra::DVector;
use nl_core::{Mapping, Real};
use nl_jacobian::JacobianProvider;
use nl_lu::ProfileLu;
use tracing::debug;

pub struct LazyFakeBroyden {
    provider: Box<dyn JacobianProvider>,
    lu: ProfileLu,
    memory: StepMemory,
    lazy_iterations: usize,
    /// Corrections present in the Jacobian but not in the factorization.
    pending: usize,
    have_jacobian: bool,
    flush_pending: bool,
    force_rebuild: bool,
}

impl LazyFakeBroyden {
    pub fn new(provider: Box<dyn JacobianProvider>, lazy_iterations: usize) -> Self {
        Self {
            provider,
            lu: ProfileLu::new(),
            memory: StepMemory::default(),
            lazy_iterations: lazy_iterations.max(1),
            pending: 0,
            have_jacobian: false,
            flush_pending: false,
            force_rebuild: false,
        }
    }

    /// Corrections accumulated since the factorization was last refreshed.
    pub fn pending_corrections(&self) -> usize {
        self.pending
    }
}

impl DescentDirection for LazyFakeBroyden {
    fn reset(&mut self, hard: bool) {
        self.memory.clear();
        self.flush_pending = false;
        self.force_rebuild = false;
        if hard {
            self.have_jacobian = false;
            self.pending = 0;
            self.provider.hard_reset();
        }
    }

    fn hard_reset_may_help(&self) -> bool {
        true
    }

    fn compute_direction(
        &mut self,
        mapping: &mut dyn Mapping,
        x0: &DVector<Real>,
        f0: &DVector<Real>,
        _iteration: usize,
    ) -> NewtonResult<DVector<Real>> {
        if !self.have_jacobian || self.force_rebuild {
            self.provider.compute_jacobian(mapping, x0)?;
            self.lu.set_matrix_fast(self.provider.jacobian())?;
            self.have_jacobian = true;
            self.pending = 0;
            self.flush_pending = false;
            self.force_rebuild = false;
            self.memory.clear();
            self.memory.advance(x0, f0);
        } else {
            if self.flush_pending {
                self.lu.set_matrix_fast(self.provider.jacobian())?;
                self.pending = 0;
                self.flush_pending = false;
            }
            if let Some((s, y)) = self.memory.advance(x0, f0) {
                if pattern_restricted_update(self.provider.jacobian_mut(), &s, &y)? {
                    self.pending += 1;
                    if self.pending >= self.lazy_iterations {
                        self.lu.set_matrix_fast(self.provider.jacobian())?;
                        self.pending = 0;
                    }
                }
            }
        }
        Ok(-self.lu.solve(f0)?)
    }

    fn report_success(&mut self, success: bool) {
        if success {
            return;
        }
        if self.pending > 0 {
            // The live Jacobian is ahead of the factorization; catching up
            // may already fix the next direction.
            self.flush_pending = true;
        } else {
            debug!("buffered updates exhausted, forcing a full Jacobian recompute");
            self.force_rebuild = true;
        }
    }

    fn evaluation_count(&self) -> usize {
        self.provider.evaluation_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_core::FnMapping;
    use nl_jacobian::SparseFdProvider;

    fn quadratic() -> FnMapping<impl FnMut(&DVector<Real>) -> nl_core::CoreResult<DVector<Real>>> {
        FnMapping::new(1, |x: &DVector<Real>| {
            Ok(DVector::from_element(1, x[0] * x[0] - 4.0))
        })
    }

    fn direction_at(
        strategy: &mut LazyFakeBroyden,
        mapping: &mut dyn Mapping,
        x: Real,
        iteration: usize,
    ) -> DVector<Real> {
        let x = DVector::from_element(1, x);
        let f = mapping.map(&x).unwrap();
        strategy.compute_direction(mapping, &x, &f, iteration).unwrap()
    }

    #[test]
    fn corrections_buffer_until_the_interval() {
        let mut mapping = quadratic();
        let mut strategy = LazyFakeBroyden::new(Box::new(SparseFdProvider::new(1e-7)), 2);

        direction_at(&mut strategy, &mut mapping, 3.0, 0);
        assert_eq!(strategy.pending_corrections(), 0);

        direction_at(&mut strategy, &mut mapping, 2.5, 1);
        assert_eq!(strategy.pending_corrections(), 1);

        // Interval reached: buffered corrections land in the factorization.
        direction_at(&mut strategy, &mut mapping, 2.2, 2);
        assert_eq!(strategy.pending_corrections(), 0);
    }

    #[test]
    fn failure_without_buffered_corrections_forces_a_recompute() {
        let mut mapping = quadratic();
        let mut strategy = LazyFakeBroyden::new(Box::new(SparseFdProvider::new(1e-7)), 10);

        direction_at(&mut strategy, &mut mapping, 3.0, 0);
        let after_build = strategy.evaluation_count();

        strategy.report_success(false);
        direction_at(&mut strategy, &mut mapping, 3.0, 1);
        assert!(
            strategy.evaluation_count() > after_build,
            "a failed step with nothing buffered must trigger a rebuild"
        );
        assert_eq!(strategy.pending_corrections(), 0);
    }
}
