//! Secant update applied directly to the triangular factors.
//!
//! After the first factorization no refactorization ever happens: the
//! envelope-restricted rank-1 update adjusts L and U in place so the factored
//! form satisfies the latest secant condition, and both the update and the
//! subsequent solve cost O(profile size).

use crate::descent::{DescentDirection, StepMemory};
use crate::error::NewtonResult;
use nalgebra::DVector;
use nl_core::{Mapping, Real};
use nl_jacobian::JacobianProvider;
use nl_lu::ProfileLu;

pub struct Hart {
    provider: Box<dyn JacobianProvider>,
    lu: ProfileLu,
    memory: StepMemory,
    have_factorization: bool,
}

impl Hart {
    pub fn new(provider: Box<dyn JacobianProvider>) -> Self {
        Self {
            provider,
            lu: ProfileLu::new(),
            memory: StepMemory::default(),
            have_factorization: false,
        }
    }
}

impl DescentDirection for Hart {
    fn reset(&mut self, hard: bool) {
        self.memory.clear();
        if hard {
            self.have_factorization = false;
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
        if !self.have_factorization {
            self.provider.compute_jacobian(mapping, x0)?;
            self.lu.set_matrix_fast(self.provider.jacobian())?;
            self.have_factorization = true;
            self.memory.clear();
            self.memory.advance(x0, f0);
        } else if let Some((s, y)) = self.memory.advance(x0, f0) {
            self.lu.secant_update_hart(&s, &y)?;
        }
        Ok(-self.lu.solve(f0)?)
    }

    fn report_success(&mut self, _success: bool) {}

    fn evaluation_count(&self) -> usize {
        self.provider.evaluation_count()
    }
}
