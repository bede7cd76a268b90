//! Jacobian trimming policies.
//!
//! A trimmer drops entries from a freshly computed Jacobian to reduce fill-in
//! for later factorization, trading approximation error for profile size. It
//! runs before the sparsity pattern is locked for incremental reuse, and it
//! must never remove a diagonal entry: the LU engine requires the envelope to
//! cover the diagonal.

use nl_core::{Real, SparseMatrix};

pub trait JacobianTrimmer {
    fn trim(&self, jacobian: &mut SparseMatrix);
}

/// Keep only entries within a fixed distance of the diagonal.
#[derive(Clone, Copy, Debug)]
pub struct BandTrimmer {
    pub half_bandwidth: usize,
}

impl JacobianTrimmer for BandTrimmer {
    fn trim(&self, jacobian: &mut SparseMatrix) {
        jacobian.retain(|row, col, _| row.abs_diff(col) <= self.half_bandwidth);
    }
}

/// Drop off-diagonal entries below a magnitude floor.
#[derive(Clone, Copy, Debug)]
pub struct ThresholdTrimmer {
    pub min_magnitude: Real,
}

impl JacobianTrimmer for ThresholdTrimmer {
    fn trim(&self, jacobian: &mut SparseMatrix) {
        jacobian.retain(|row, col, value| row == col || value.abs() >= self.min_magnitude);
    }
}
