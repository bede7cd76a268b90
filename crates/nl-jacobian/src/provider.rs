//! Jacobian providers: evaluate, build or refresh, optionally trim.

use crate::calculator::SparseJacobianCalculator;
use crate::error::JacobianResult;
use crate::trimmer::JacobianTrimmer;
use nalgebra::DVector;
use nl_core::{FastSparseMatrix, Mapping, Real, SparseMatrix};
use tracing::debug;

/// Source of an approximate Jacobian for the current iterate.
///
/// A provider owns the matrix it exposes; descent strategies may mutate it in
/// place between computations (quasi-Newton corrections), which is why
/// [`JacobianProvider::jacobian_mut`] is part of the contract.
pub trait JacobianProvider {
    /// Build or refresh the Jacobian of `mapping` at `x0`.
    fn compute_jacobian(
        &mut self,
        mapping: &mut dyn Mapping,
        x0: &DVector<Real>,
    ) -> JacobianResult<()>;

    /// The most recently computed Jacobian.
    fn jacobian(&self) -> &FastSparseMatrix;

    /// In-place access for incremental corrections between computations.
    fn jacobian_mut(&mut self) -> &mut FastSparseMatrix;

    /// Discard any cached sparsity pattern; the next computation rebuilds
    /// from scratch.
    fn hard_reset(&mut self);

    /// Total residual evaluations spent building Jacobians.
    fn evaluation_count(&self) -> usize;
}

/// One full forward-difference sweep, one evaluation per column.
///
/// Entries whose quotient is exactly zero are dropped, except on the diagonal:
/// the pattern handed to the LU engine must cover the diagonal even where the
/// derivative vanishes.
fn full_fd_jacobian(
    mapping: &mut dyn Mapping,
    x0: &DVector<Real>,
    delta: Real,
    evaluations: &mut usize,
) -> JacobianResult<SparseMatrix> {
    let n = mapping.square_size()?;
    let f0 = mapping.map(x0)?;
    *evaluations += 1;

    let mut jac = SparseMatrix::new(n, n);
    let mut x = x0.clone();
    for col in 0..n {
        x[col] += delta;
        let f = mapping.map(&x)?;
        *evaluations += 1;
        x[col] = x0[col];

        for row in 0..n {
            let quotient = (f[row] - f0[row]) / delta;
            if quotient != 0.0 || row == col {
                jac.set(row, col, quotient)?;
            }
        }
    }
    Ok(jac)
}

/// Recomputes a full finite-difference Jacobian on every call.
pub struct DenseFdProvider {
    delta: Real,
    trimmer: Option<Box<dyn JacobianTrimmer>>,
    jacobian: FastSparseMatrix,
    evaluations: usize,
}

impl DenseFdProvider {
    pub fn new(delta: Real) -> Self {
        Self {
            delta,
            trimmer: None,
            jacobian: FastSparseMatrix::default(),
            evaluations: 0,
        }
    }

    pub fn with_trimmer(mut self, trimmer: Option<Box<dyn JacobianTrimmer>>) -> Self {
        self.trimmer = trimmer;
        self
    }
}

impl JacobianProvider for DenseFdProvider {
    fn compute_jacobian(
        &mut self,
        mapping: &mut dyn Mapping,
        x0: &DVector<Real>,
    ) -> JacobianResult<()> {
        let mut jac = full_fd_jacobian(mapping, x0, self.delta, &mut self.evaluations)?;
        if let Some(trimmer) = &self.trimmer {
            trimmer.trim(&mut jac);
        }
        self.jacobian = FastSparseMatrix::from(&jac);
        Ok(())
    }

    fn jacobian(&self) -> &FastSparseMatrix {
        &self.jacobian
    }

    fn jacobian_mut(&mut self) -> &mut FastSparseMatrix {
        &mut self.jacobian
    }

    fn hard_reset(&mut self) {
        // Nothing cached between calls.
    }

    fn evaluation_count(&self) -> usize {
        self.evaluations
    }
}

/// Builds the full Jacobian once, locks its pattern, and refreshes it with
/// grouped evaluations afterwards.
pub struct SparseFdProvider {
    delta: Real,
    trimmer: Option<Box<dyn JacobianTrimmer>>,
    jacobian: FastSparseMatrix,
    calculator: Option<SparseJacobianCalculator>,
    evaluations: usize,
}

impl SparseFdProvider {
    pub fn new(delta: Real) -> Self {
        Self {
            delta,
            trimmer: None,
            jacobian: FastSparseMatrix::default(),
            calculator: None,
            evaluations: 0,
        }
    }

    pub fn with_trimmer(mut self, trimmer: Option<Box<dyn JacobianTrimmer>>) -> Self {
        self.trimmer = trimmer;
        self
    }
}

impl JacobianProvider for SparseFdProvider {
    fn compute_jacobian(
        &mut self,
        mapping: &mut dyn Mapping,
        x0: &DVector<Real>,
    ) -> JacobianResult<()> {
        if let Some(calculator) = &self.calculator {
            self.evaluations += calculator.evaluations_required();
            return calculator.calculate(mapping, x0, self.delta, &mut self.jacobian);
        }

        let mut jac = full_fd_jacobian(mapping, x0, self.delta, &mut self.evaluations)?;
        if let Some(trimmer) = &self.trimmer {
            trimmer.trim(&mut jac);
        }
        self.jacobian = FastSparseMatrix::from(&jac);

        let calculator = SparseJacobianCalculator::new(&self.jacobian);
        debug!(
            entries = self.jacobian.len(),
            evaluations = calculator.evaluations_required(),
            "sparsity pattern locked for incremental reuse"
        );
        self.calculator = Some(calculator);
        Ok(())
    }

    fn jacobian(&self) -> &FastSparseMatrix {
        &self.jacobian
    }

    fn jacobian_mut(&mut self) -> &mut FastSparseMatrix {
        &mut self.jacobian
    }

    fn hard_reset(&mut self) {
        self.calculator = None;
    }

    fn evaluation_count(&self) -> usize {
        self.evaluations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_core::FnMapping;

    fn banded_mapping(n: usize) -> impl Mapping {
        FnMapping::new(n, move |x: &DVector<Real>| {
            let mut f = DVector::zeros(n);
            for i in 0..n {
                let left = if i > 0 { x[i - 1] } else { 0.0 };
                f[i] = 2.0 * x[i] + left * left;
            }
            Ok(f)
        })
    }

    #[test]
    fn dense_provider_recomputes_every_call() {
        let n = 4;
        let mut mapping = banded_mapping(n);
        let mut provider = DenseFdProvider::new(1e-7);
        let x = DVector::from_element(n, 1.0);

        provider.compute_jacobian(&mut mapping, &x).unwrap();
        assert_eq!(provider.evaluation_count(), n + 1);
        provider.compute_jacobian(&mut mapping, &x).unwrap();
        assert_eq!(provider.evaluation_count(), 2 * (n + 1));
    }

    #[test]
    fn sparse_provider_locks_pattern_and_gets_cheaper() {
        let n = 6;
        let mut mapping = banded_mapping(n);
        let mut provider = SparseFdProvider::new(1e-7);
        let x = DVector::from_element(n, 1.0);

        provider.compute_jacobian(&mut mapping, &x).unwrap();
        let first = provider.evaluation_count();
        assert_eq!(first, n + 1);

        provider.compute_jacobian(&mut mapping, &x).unwrap();
        let second = provider.evaluation_count() - first;
        // Lower-bidiagonal coupling needs two groups plus the baseline.
        assert!(second < first, "grouped refill should be cheaper");
        assert_eq!(second, 3);
    }

    #[test]
    fn sparse_refill_matches_dense_rebuild() {
        let n = 5;
        let mut mapping = banded_mapping(n);
        let mut sparse = SparseFdProvider::new(1e-7);
        let mut dense = DenseFdProvider::new(1e-7);

        let x0 = DVector::from_element(n, 1.0);
        sparse.compute_jacobian(&mut mapping, &x0).unwrap();

        let x1 = DVector::from_vec(vec![0.5, -1.0, 2.0, 1.5, -0.5]);
        sparse.compute_jacobian(&mut mapping, &x1).unwrap();
        dense.compute_jacobian(&mut mapping, &x1).unwrap();

        for e in dense.jacobian().entries() {
            assert!(
                (sparse.jacobian().get(e.row, e.col) - e.value).abs() < 1e-5,
                "entry ({}, {}) disagrees",
                e.row,
                e.col
            );
        }
    }

    #[test]
    fn hard_reset_forces_full_rebuild() {
        let n = 4;
        let mut mapping = banded_mapping(n);
        let mut provider = SparseFdProvider::new(1e-7);
        let x = DVector::from_element(n, 1.0);

        provider.compute_jacobian(&mut mapping, &x).unwrap();
        provider.hard_reset();
        provider.compute_jacobian(&mut mapping, &x).unwrap();
        assert_eq!(provider.evaluation_count(), 2 * (n + 1));
    }

    #[test]
    fn diagonal_survives_even_when_derivative_is_zero() {
        // f_0 does not depend on x_0 at all.
        let mut mapping = FnMapping::new(2, |x: &DVector<Real>| {
            Ok(DVector::from_vec(vec![x[1], x[0] + x[1]]))
        });
        let mut provider = DenseFdProvider::new(1e-7);
        provider
            .compute_jacobian(&mut mapping, &DVector::zeros(2))
            .unwrap();
        assert!(provider.jacobian().position(0, 0).is_some());
        assert_eq!(provider.jacobian().get(0, 0), 0.0);
    }
}
