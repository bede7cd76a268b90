//! Frozen Jacobian: factorize on the first call, reuse indefinitely.

use crate::descent::DescentDirection;
use crate::error::NewtonResult;
use nalgebra::DVector;
use nl_core::{Mapping, Real};
use nl_jacobian::JacobianProvider;
use nl_lu::ProfileLu;

pub struct ConstantJacobian {
    provider: Box<dyn JacobianProvider>,
    lu: ProfileLu,
    have_factorization: bool,
}

impl ConstantJacobian {
    pub fn new(provider: Box<dyn JacobianProvider>) -> Self {
        Self {
            provider,
            lu: ProfileLu::new(),
            have_factorization: false,
        }
    }
}

impl DescentDirection for ConstantJacobian {
    fn reset(&mut self, hard: bool) {
        // Soft resets keep the factorization; that is the whole point of the
        // strategy.
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
        }
        Ok(-self.lu.solve(f0)?)
    }

    fn report_success(&mut self, _success: bool) {}

    fn evaluation_count(&self) -> usize {
        self.provider.evaluation_count()
    }
}
