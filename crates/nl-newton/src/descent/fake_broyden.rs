//! Sparsity-preserving Broyden update.
//!
//! The classical rank-1 correction is applied only at entries already present
//! in the sparse pattern. The secant condition no longer holds exactly, but
//! the envelope never grows, so the profile factorization stays cheap. The LU
//! is re-set (and lazily refactorized) after every change.

use crate::descent::{DescentDirection, StepMemory};
use crate::error::NewtonResult;
use nalgebra::DVector;
use nl_core::{FastSparseMatrix, Mapping, Real};
use nl_jacobian::JacobianProvider;
use nl_lu::ProfileLu;

pub struct FakeBroyden {
    provider: Box<dyn JacobianProvider>,
    lu: ProfileLu,
    memory: StepMemory,
    have_jacobian: bool,
}

impl FakeBroyden {
    pub fn new(provider: Box<dyn JacobianProvider>) -> Self {
        Self {
            provider,
            lu: ProfileLu::new(),
            memory: StepMemory::default(),
            have_jacobian: false,
        }
    }
}

/// Apply the Broyden correction restricted to the stored pattern:
/// `J[i][j] += (y - J*s)[i] * s[j] / (s^T s)`.
pub(crate) fn pattern_restricted_update(
    jacobian: &mut FastSparseMatrix,
    s: &DVector<Real>,
    y: &DVector<Real>,
) -> NewtonResult<bool> {
    let denom = s.norm_squared();
    if denom == 0.0 {
        return Ok(false);
    }
    let correction = (y - jacobian.mul_vec(s)?) / denom;
    for e in jacobian.entries_mut() {
        e.value += correction[e.row] * s[e.col];
    }
    Ok(true)
}

impl DescentDirection for FakeBroyden {
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
            self.lu.set_matrix_fast(self.provider.jacobian())?;
            self.have_jacobian = true;
            self.memory.clear();
            self.memory.advance(x0, f0);
        } else if let Some((s, y)) = self.memory.advance(x0, f0) {
            if pattern_restricted_update(self.provider.jacobian_mut(), &s, &y)? {
                self.lu.set_matrix_fast(self.provider.jacobian())?;
            }
        }
        Ok(-self.lu.solve(f0)?)
    }

    fn report_success(&mut self, _success: bool) {}

    fn evaluation_count(&self) -> usize {
        self.provider.evaluation_count()
    }
}
