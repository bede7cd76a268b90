//! Grouped finite-difference evaluation over a fixed sparsity pattern.

use crate::error::{JacobianError, JacobianResult};
use nalgebra::DVector;
use nl_core::{FastSparseMatrix, Mapping, Real};
use tracing::debug;

/// Column-grouping schedule for sparse finite differencing.
///
/// Construction partitions the pattern's columns into groups whose
/// structurally nonzero row sets are mutually disjoint, so all columns of a
/// group can be perturbed in one residual evaluation without
/// cross-contaminating difference quotients. The grouping is greedy: pick the
/// first unassigned column, then absorb every later unassigned column that
/// touches none of the rows claimed so far. Linear-time, not guaranteed
/// minimal, which is the right trade for patterns rebuilt at runtime.
///
/// The schedule is valid for exactly one pattern; rebuild it whenever the
/// pattern changes.
#[derive(Clone, Debug)]
pub struct SparseJacobianCalculator {
    nrows: usize,
    ncols: usize,
    /// Structurally nonzero rows of each column, ascending.
    rows_of: Vec<Vec<usize>>,
    /// Disjoint-row column groups; every column appears in exactly one group.
    groups: Vec<Vec<usize>>,
}

impl SparseJacobianCalculator {
    pub fn new(pattern: &FastSparseMatrix) -> Self {
        let nrows = pattern.nrows();
        let ncols = pattern.ncols();

        let mut rows_of = vec![Vec::new(); ncols];
        for e in pattern.entries() {
            rows_of[e.col].push(e.row);
        }

        let mut assigned = vec![false; ncols];
        let mut claimed = vec![false; nrows];
        let mut groups = Vec::new();
        for seed in 0..ncols {
            if assigned[seed] {
                continue;
            }
            claimed.fill(false);
            let mut group = vec![seed];
            assigned[seed] = true;
            for &r in &rows_of[seed] {
                claimed[r] = true;
            }
            for cand in seed + 1..ncols {
                if assigned[cand] || rows_of[cand].iter().any(|&r| claimed[r]) {
                    continue;
                }
                assigned[cand] = true;
                for &r in &rows_of[cand] {
                    claimed[r] = true;
                }
                group.push(cand);
            }
            groups.push(group);
        }

        debug!(
            ncols,
            groups = groups.len(),
            "column grouping derived for sparsity pattern"
        );
        Self {
            nrows,
            ncols,
            rows_of,
            groups,
        }
    }

    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    /// Residual evaluations per `calculate` call: one per group plus the
    /// baseline.
    pub fn evaluations_required(&self) -> usize {
        self.groups.len() + 1
    }

    /// Fill `target` with forward difference quotients of `mapping` at `x0`.
    ///
    /// `target` must carry the pattern this schedule was built for. Each
    /// group's columns are perturbed simultaneously by `delta`; quotients are
    /// written only at the (row, col) slots known a priori to belong to each
    /// column.
    pub fn calculate(
        &self,
        mapping: &mut dyn Mapping,
        x0: &DVector<Real>,
        delta: Real,
        target: &mut FastSparseMatrix,
    ) -> JacobianResult<()> {
        if delta == 0.0 {
            return Err(JacobianError::Setup {
                what: "finite-difference delta must be nonzero".to_string(),
            });
        }
        if target.nrows() != self.nrows || target.ncols() != self.ncols {
            return Err(JacobianError::Setup {
                what: format!(
                    "target is {}x{}, schedule was built for {}x{}",
                    target.nrows(),
                    target.ncols(),
                    self.nrows,
                    self.ncols
                ),
            });
        }

        let f0 = mapping.map(x0)?;
        if f0.len() != self.nrows {
            return Err(JacobianError::Setup {
                what: format!("mapping returned {} rows, expected {}", f0.len(), self.nrows),
            });
        }

        let mut x = x0.clone();
        for group in &self.groups {
            for &col in group {
                x[col] += delta;
            }
            let f = mapping.map(&x)?;
            for &col in group {
                for &row in &self.rows_of[col] {
                    let quotient = (f[row] - f0[row]) / delta;
                    let slot = target.position(row, col).ok_or_else(|| JacobianError::Setup {
                        what: format!("target pattern is missing entry ({row}, {col})"),
                    })?;
                    target.entries_mut()[slot].value = quotient;
                }
                x[col] = x0[col];
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use nl_core::SparseMatrix;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn grouping_never_shares_a_row(
            n in 2usize..9,
            extra in prop::collection::vec((0usize..8, 0usize..8), 0..20),
        ) {
            let mut m = SparseMatrix::new(n, n);
            for i in 0..n {
                m.set(i, i, 1.0).unwrap();
            }
            for (r, c) in extra {
                if r < n && c < n {
                    m.set(r, c, 1.0).unwrap();
                }
            }
            let pattern = FastSparseMatrix::from(&m);
            let calc = SparseJacobianCalculator::new(&pattern);

            for group in calc.groups() {
                let mut seen = vec![false; n];
                for &col in group {
                    for e in pattern.entries().iter().filter(|e| e.col == col) {
                        prop_assert!(!seen[e.row]);
                        seen[e.row] = true;
                    }
                }
            }
        }
    }
}
