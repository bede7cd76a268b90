//! Full Newton: fresh Jacobian and factorization every iteration.

use crate::descent::DescentDirection;
use crate::error::NewtonResult;
use nalgebra::DVector;
use nl_core::{Mapping, Real};
use nl_jacobian::JacobianProvider;
use nl_lu::ProfileLu;

pub struct SimpleNewton {
    provider: Box<dyn JacobianProvider>,
    lu: ProfileLu,
}

impl SimpleNewton {
    pub fn new(provider: Box<dyn JacobianProvider>) -> Self {
        Self {
            provider,
            lu: ProfileLu::new(),
        }
    }
}

impl DescentDirection for SimpleNewton {
    fn reset(&mut self, hard: bool) {
        if hard {
            self.provider.hard_reset();
        }
    }

    fn hard_reset_may_help(&self) -> bool {
        // The Jacobian is already rebuilt every iteration.
        false
    }

    fn compute_direction(
        &mut self,
        mapping: &mut dyn Mapping,
        x0: &DVector<Real>,
        f0: &DVector<Real>,
        _iteration: usize,
    ) -> NewtonResult<DVector<Real>> {
        self.provider.compute_jacobian(mapping, x0)?;
        self.lu.set_matrix_fast(self.provider.jacobian())?;
        Ok(-self.lu.solve(f0)?)
    }

    fn report_success(&mut self, _success: bool) {}

    fn evaluation_count(&self) -> usize {
        self.provider.evaluation_count()
    }
}
