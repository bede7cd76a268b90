//! Classical dense Broyden update.
//!
//! Reference implementation only: the rank-1 correction is dense, so the
//! sparse pattern degrades to a full matrix and every iteration pays an
//! O(n^3) dense factorization. Use [`crate::descent::FakeBroyden`] or
//! [`crate::descent::Hart`] for production-sized systems.

use crate::descent::{DescentDirection, StepMemory};
use crate::error::{NewtonError, NewtonResult};
use nalgebra::{DMatrix, DVector};
use nl_core::{FastSparseMatrix, Mapping, Real};
use nl_jacobian::JacobianProvider;

pub struct Broyden {
    provider: Box<dyn JacobianProvider>,
    jacobian: DMatrix<Real>,
    memory: StepMemory,
    have_jacobian: bool,
}

impl Broyden {
    pub fn new(provider: Box<dyn JacobianProvider>) -> Self {
        Self {
            provider,
            jacobian: DMatrix::zeros(0, 0),
            memory: StepMemory::default(),
            have_jacobian: false,
        }
    }
}

fn to_dense(sparse: &FastSparseMatrix) -> DMatrix<Real> {
    let mut dense = DMatrix::zeros(sparse.nrows(), sparse.ncols());
    for e in sparse.entries() {
        dense[(e.row, e.col)] = e.value;
    }
    dense
}

impl DescentDirection for Broyden {
    fn reset(&mut self, hard: bool) {
        self.memory.clear();
        if hard {
            self.have_jacobian = false;
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
        if !self.have_jacobian {
            self.provider.compute_jacobian(mapping, x0)?;
            self.jacobian = to_dense(self.provider.jacobian());
            self.have_jacobian = true;
            self.memory.clear();
            self.memory.advance(x0, f0);
        } else if let Some((s, y)) = self.memory.advance(x0, f0) {
            let denom = s.norm_squared();
            if denom > 0.0 {
                let correction = (y - &self.jacobian * &s) / denom;
                self.jacobian += correction * s.transpose();
            }
        }

        self.jacobian
            .clone()
            .lu()
            .solve(&(-f0.clone()))
            .ok_or_else(|| NewtonError::Numeric {
                what: "dense Jacobian solve failed".to_string(),
            })
    }

    fn report_success(&mut self, _success: bool) {}

    fn evaluation_count(&self) -> usize {
        self.provider.evaluation_count()
    }
}
