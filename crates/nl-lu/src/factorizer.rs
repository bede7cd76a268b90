//! Profile (skyline) LU factorization over a fixed envelope.
//!
//! Storage layout: L is unit lower triangular, stored row-wise without the
//! diagonal; U carries the diagonal and everything above, stored column-wise.
//! Each row/column is addressed by its first structurally nonzero index, so
//! a row of L occupies the contiguous slice `row_start[i]..i` and a column of
//! U the slice `col_start[j]..=j` of the flat backing arrays. The bounds are
//! derived once per pattern and never change afterwards; only the numeric
//! contents of the backing arrays do.
//!
//! Factorization without pivoting keeps all fill inside the profile, which is
//! what makes the secant updates and the triangular solves O(profile size).

use crate::error::{LuError, LuResult};
use nalgebra::DVector;
use nl_core::{FastSparseMatrix, Real};
use tracing::{debug, trace};

/// Validity of the cached factorization relative to the stored numerics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FactorState {
    /// No matrix loaded yet.
    Empty,
    /// Numerics changed since the last factorization.
    Stale,
    /// Backing arrays hold current L/U factors.
    Fresh,
}

/// Sparse LU factorizer with a fixed symbolic envelope.
#[derive(Clone, Debug)]
pub struct ProfileLu {
    n: usize,
    /// First column of L row i; the row is empty when this equals i.
    row_start: Vec<usize>,
    /// First row of U column j; always <= j, so the diagonal is representable.
    col_start: Vec<usize>,
    /// Offset of L row i in `l`.
    l_offset: Vec<usize>,
    /// Offset of U column j in `u`.
    u_offset: Vec<usize>,
    l: Vec<Real>,
    u: Vec<Real>,
    /// Row-wise index of U: for each row, (col, flat index) pairs ascending.
    /// Built once per pattern so the secant updates can walk U rows without
    /// scanning every column.
    u_rows: Vec<Vec<(usize, usize)>>,
    state: FactorState,
    generation: u64,
}

impl Default for ProfileLu {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileLu {
    /// Create an empty factorizer; load a matrix with [`ProfileLu::set_matrix`].
    pub fn new() -> Self {
        Self {
            n: 0,
            row_start: Vec::new(),
            col_start: Vec::new(),
            l_offset: Vec::new(),
            u_offset: Vec::new(),
            l: Vec::new(),
            u: Vec::new(),
            u_rows: Vec::new(),
            state: FactorState::Empty,
            generation: 0,
        }
    }

    /// Matrix dimension, 0 before the first `set_matrix`.
    pub fn dimension(&self) -> usize {
        self.n
    }

    pub fn is_factorized(&self) -> bool {
        self.state == FactorState::Fresh
    }

    /// Bumped by every `set_matrix`/`set_matrix_fast`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Derive profile bounds from the matrix pattern and copy its numerics.
    ///
    /// The pattern must be square and its envelope must cover the diagonal:
    /// every row needs an entry at or left of the diagonal and every column an
    /// entry at or above it. Invalidates any cached factorization.
    pub fn set_matrix(&mut self, m: &FastSparseMatrix) -> LuResult<()> {
        if m.nrows() != m.ncols() {
            return Err(LuError::InvalidSparsityPattern {
                what: format!("matrix is {}x{}, not square", m.nrows(), m.ncols()),
            });
        }
        let n = m.nrows();
        if n == 0 {
            return Err(LuError::InvalidSparsityPattern {
                what: "matrix has no rows".to_string(),
            });
        }

        let mut min_col = vec![usize::MAX; n];
        let mut min_row = vec![usize::MAX; n];
        for e in m.entries() {
            min_col[e.row] = min_col[e.row].min(e.col);
            min_row[e.col] = min_row[e.col].min(e.row);
        }
        for i in 0..n {
            if min_col[i] > i {
                return Err(LuError::InvalidSparsityPattern {
                    what: format!("row {i} has no entry at or left of the diagonal"),
                });
            }
            if min_row[i] > i {
                return Err(LuError::InvalidSparsityPattern {
                    what: format!("column {i} has no entry at or above the diagonal"),
                });
            }
        }

        self.n = n;
        self.row_start = min_col;
        self.col_start = min_row;

        // Packed offsets: L row i spans row_start[i]..i, U col j spans
        // col_start[j]..=j.
        self.l_offset = vec![0; n];
        self.u_offset = vec![0; n];
        let mut l_len = 0;
        let mut u_len = 0;
        for i in 0..n {
            self.l_offset[i] = l_len;
            l_len += i - self.row_start[i];
            self.u_offset[i] = u_len;
            u_len += i - self.col_start[i] + 1;
        }
        self.l = vec![0.0; l_len];
        self.u = vec![0.0; u_len];
        self.fill_values(m);

        self.u_rows = vec![Vec::new(); n];
        for j in 0..n {
            for r in self.col_start[j]..=j {
                self.u_rows[r].push((j, self.u_offset[j] + (r - self.col_start[j])));
            }
        }

        trace!(n, l_len, u_len, "profile bounds derived");
        self.state = FactorState::Stale;
        self.generation += 1;
        Ok(())
    }

    /// Re-fill numeric contents assuming the profile bounds are unchanged.
    ///
    /// Each entry is placed with an O(1) profile-bounded lookup. If any entry
    /// falls outside the existing profile (the envelope grew), the call falls
    /// back to a full [`ProfileLu::set_matrix`]: correctness is preserved at
    /// the cost of re-deriving the bounds, with no error surfaced.
    pub fn set_matrix_fast(&mut self, m: &FastSparseMatrix) -> LuResult<()> {
        if self.state == FactorState::Empty || self.n != m.nrows() || m.nrows() != m.ncols() {
            return self.set_matrix(m);
        }
        let in_profile = m.entries().iter().all(|e| {
            if e.col < e.row {
                e.col >= self.row_start[e.row]
            } else {
                e.row >= self.col_start[e.col]
            }
        });
        if !in_profile {
            debug!("sparsity pattern grew beyond the stored profile; rebuilding bounds");
            return self.set_matrix(m);
        }

        self.fill_values(m);
        self.state = FactorState::Stale;
        self.generation += 1;
        Ok(())
    }

    /// Zero the backing arrays and copy entry values into their slots.
    /// All entries must already be known to lie inside the profile.
    fn fill_values(&mut self, m: &FastSparseMatrix) {
        self.l.fill(0.0);
        self.u.fill(0.0);
        for e in m.entries() {
            if e.col < e.row {
                self.l[self.l_offset[e.row] + (e.col - self.row_start[e.row])] = e.value;
            } else {
                self.u[self.u_offset[e.col] + (e.row - self.col_start[e.col])] = e.value;
            }
        }
    }

    #[inline]
    fn l_at(&self, i: usize, j: usize) -> Real {
        self.l[self.l_offset[i] + (j - self.row_start[i])]
    }

    #[inline]
    fn u_at(&self, i: usize, j: usize) -> Real {
        self.u[self.u_offset[j] + (i - self.col_start[j])]
    }

    /// Doolittle factorization in place, honoring the profile bounds.
    ///
    /// At step i the strictly-lower row i and the upper column i are
    /// finalized; inner products skip straight to the first structurally
    /// nonzero index of whichever operand starts later.
    fn factorize(&mut self) -> LuResult<()> {
        for i in 0..self.n {
            for j in self.row_start[i]..i {
                let lo = self.row_start[i].max(self.col_start[j]);
                let mut sum = 0.0;
                for k in lo..j {
                    sum += self.l_at(i, k) * self.u_at(k, j);
                }
                let idx = self.l_offset[i] + (j - self.row_start[i]);
                self.l[idx] = (self.l[idx] - sum) / self.u_at(j, j);
            }
            for r in self.col_start[i]..=i {
                let lo = self.row_start[r].max(self.col_start[i]);
                let mut sum = 0.0;
                for k in lo..r {
                    sum += self.l_at(r, k) * self.u_at(k, i);
                }
                let idx = self.u_offset[i] + (r - self.col_start[i]);
                self.u[idx] -= sum;
            }
            if self.u_at(i, i) == 0.0 {
                return Err(LuError::SingularPivot { row: i });
            }
        }
        trace!(n = self.n, "factorized");
        self.state = FactorState::Fresh;
        Ok(())
    }

    /// Factorize lazily: a no-op while the cached factorization is current.
    fn ensure_factorized(&mut self) -> LuResult<()> {
        match self.state {
            FactorState::Empty => Err(LuError::NotInitialized),
            FactorState::Stale => self.factorize(),
            FactorState::Fresh => Ok(()),
        }
    }

    /// Solve `A x = b` with the cached factorization, factorizing on demand.
    pub fn solve(&mut self, b: &DVector<Real>) -> LuResult<DVector<Real>> {
        self.ensure_factorized()?;
        if b.len() != self.n {
            return Err(LuError::SizeMismatch {
                expected: self.n,
                found: b.len(),
            });
        }

        let mut x = b.clone();
        // Forward substitution through L rows (unit diagonal).
        for i in 0..self.n {
            let mut s = x[i];
            for j in self.row_start[i]..i {
                s -= self.l_at(i, j) * x[j];
            }
            x[i] = s;
        }
        // Backward substitution through U columns.
        for j in (0..self.n).rev() {
            x[j] /= self.u_at(j, j);
            let xj = x[j];
            for r in self.col_start[j]..j {
                x[r] -= self.u_at(r, j) * xj;
            }
        }
        Ok(x)
    }

    /// Rank-1 secant update of the factored form, restricted to the envelope.
    ///
    /// Adjusts L and U in place so that `(L·U)·s = y` holds exactly
    /// afterwards, without adding any entry outside the fixed profile. Row by
    /// row, the defect `beta` of the row equation is distributed over the
    /// row's profile entries weighted by the corresponding components of the
    /// running product `r = U·s` (for L) and of `s` (for U). A vanishing
    /// weight sum with nonzero defect means the step carries no information
    /// for that row and is reported as [`LuError::DegenerateSecantUpdate`].
    pub fn secant_update_hart(&mut self, s: &DVector<Real>, y: &DVector<Real>) -> LuResult<()> {
        self.check_update_sizes(s, y)?;
        self.ensure_factorized()?;

        let mut r = vec![0.0; self.n];
        for i in 0..self.n {
            let mut beta = y[i];
            let mut aa = 0.0;
            for j in self.row_start[i]..i {
                beta -= self.l_at(i, j) * r[j];
                aa += r[j] * r[j];
            }
            for &(col, idx) in &self.u_rows[i] {
                beta -= self.u[idx] * s[col];
                aa += s[col] * s[col];
            }

            if beta != 0.0 {
                if aa == 0.0 {
                    return Err(LuError::DegenerateSecantUpdate { row: i });
                }
                let factor = beta / aa;
                for j in self.row_start[i]..i {
                    self.l[self.l_offset[i] + (j - self.row_start[i])] += factor * r[j];
                }
                for &(col, idx) in &self.u_rows[i] {
                    self.u[idx] += factor * s[col];
                }
            }

            // Advance the running product with the (possibly updated) U row,
            // even when this row needed no change.
            let mut ri = 0.0;
            for &(col, idx) in &self.u_rows[i] {
                ri += self.u[idx] * s[col];
            }
            r[i] = ri;
        }
        Ok(())
    }

    /// Proportional secant update: scale each row of the factored form by
    /// `1 + beta/c` so its contribution matches `y` exactly.
    ///
    /// Unlike the additive update this divides by the row's current
    /// contribution `c`; a zero `c` against a nonzero defect means the update
    /// direction is orthogonal to the row and is reported as
    /// [`LuError::OrthogonalityError`].
    pub fn secant_update_proportional(
        &mut self,
        s: &DVector<Real>,
        y: &DVector<Real>,
    ) -> LuResult<()> {
        self.check_update_sizes(s, y)?;
        self.ensure_factorized()?;

        let mut r = vec![0.0; self.n];
        for i in 0..self.n {
            let mut lpart = 0.0;
            for j in self.row_start[i]..i {
                lpart += self.l_at(i, j) * r[j];
            }
            let mut upart = 0.0;
            for &(col, idx) in &self.u_rows[i] {
                upart += self.u[idx] * s[col];
            }
            let c = lpart + upart;
            let beta = y[i] - c;

            if beta != 0.0 {
                if c == 0.0 {
                    return Err(LuError::OrthogonalityError { row: i });
                }
                let scale = 1.0 + beta / c;
                for j in self.row_start[i]..i {
                    self.l[self.l_offset[i] + (j - self.row_start[i])] *= scale;
                }
                for &(_, idx) in &self.u_rows[i] {
                    self.u[idx] *= scale;
                }
                r[i] = scale * upart;
            } else {
                r[i] = upart;
            }
        }
        Ok(())
    }

    fn check_update_sizes(&self, s: &DVector<Real>, y: &DVector<Real>) -> LuResult<()> {
        if self.state == FactorState::Empty {
            return Err(LuError::NotInitialized);
        }
        if s.len() != self.n {
            return Err(LuError::SizeMismatch {
                expected: self.n,
                found: s.len(),
            });
        }
        if y.len() != self.n {
            return Err(LuError::SizeMismatch {
                expected: self.n,
                found: y.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_core::SparseMatrix;

    fn tridiag(diag: &[Real], lower: &[Real], upper: &[Real]) -> FastSparseMatrix {
        let n = diag.len();
        let mut m = SparseMatrix::new(n, n);
        for i in 0..n {
            m.set(i, i, diag[i]).unwrap();
        }
        for i in 0..n - 1 {
            m.set(i + 1, i, lower[i]).unwrap();
            m.set(i, i + 1, upper[i]).unwrap();
        }
        FastSparseMatrix::from(&m)
    }

    fn assert_vec_close(a: &DVector<Real>, b: &DVector<Real>, tol: Real) {
        assert_eq!(a.len(), b.len());
        for i in 0..a.len() {
            assert!(
                (a[i] - b[i]).abs() < tol,
                "component {i}: {} vs {}",
                a[i],
                b[i]
            );
        }
    }

    #[test]
    fn solve_recovers_known_solution() {
        let m = tridiag(&[4.0, 4.0, 4.0], &[1.0, 1.0], &[1.0, 1.0]);
        let x_true = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let b = m.mul_vec(&x_true).unwrap();

        let mut lu = ProfileLu::new();
        lu.set_matrix(&m).unwrap();
        let x = lu.solve(&b).unwrap();
        assert_vec_close(&x, &x_true, 1e-12);
    }

    #[test]
    fn factorization_is_cached_until_invalidated() {
        let m = tridiag(&[4.0, 4.0], &[1.0], &[1.0]);
        let mut lu = ProfileLu::new();
        lu.set_matrix(&m).unwrap();
        assert!(!lu.is_factorized());
        let generation = lu.generation();

        lu.solve(&DVector::from_vec(vec![1.0, 1.0])).unwrap();
        assert!(lu.is_factorized());
        assert_eq!(lu.generation(), generation);

        lu.set_matrix_fast(&m).unwrap();
        assert!(!lu.is_factorized());
        assert_eq!(lu.generation(), generation + 1);
    }

    #[test]
    fn fast_refill_matches_full_setup() {
        let pattern = tridiag(&[4.0, 5.0, 6.0], &[1.0, 2.0], &[0.5, 0.25]);
        let refilled = tridiag(&[7.0, 8.0, 9.0], &[0.1, 0.2], &[1.5, 2.5]);
        let b = DVector::from_vec(vec![1.0, -2.0, 3.0]);

        let mut fast = ProfileLu::new();
        fast.set_matrix(&pattern).unwrap();
        fast.set_matrix_fast(&refilled).unwrap();

        let mut full = ProfileLu::new();
        full.set_matrix(&refilled).unwrap();

        assert_vec_close(&fast.solve(&b).unwrap(), &full.solve(&b).unwrap(), 1e-13);
    }

    #[test]
    fn fast_refill_falls_back_when_envelope_grows() {
        let mut diag = SparseMatrix::new(2, 2);
        diag.set(0, 0, 2.0).unwrap();
        diag.set(1, 1, 3.0).unwrap();

        let mut lu = ProfileLu::new();
        lu.set_matrix(&FastSparseMatrix::from(&diag)).unwrap();

        // New entry outside the diagonal profile: must rebuild, not fail.
        let mut grown = diag.clone();
        grown.set(0, 1, 1.0).unwrap();
        lu.set_matrix_fast(&FastSparseMatrix::from(&grown)).unwrap();

        let x = lu.solve(&DVector::from_vec(vec![4.0, 3.0])).unwrap();
        assert_vec_close(&x, &DVector::from_vec(vec![1.5, 1.0]), 1e-13);
    }

    #[test]
    fn rejects_non_square_pattern() {
        let mut m = SparseMatrix::new(2, 3);
        m.set(0, 0, 1.0).unwrap();
        m.set(1, 1, 1.0).unwrap();
        let err = ProfileLu::new()
            .set_matrix(&FastSparseMatrix::from(&m))
            .unwrap_err();
        assert!(matches!(err, LuError::InvalidSparsityPattern { .. }));
    }

    #[test]
    fn rejects_envelope_missing_diagonal() {
        // Row 0 only has an entry right of the diagonal.
        let mut m = SparseMatrix::new(2, 2);
        m.set(0, 1, 1.0).unwrap();
        m.set(1, 0, 1.0).unwrap();
        m.set(1, 1, 1.0).unwrap();
        let err = ProfileLu::new()
            .set_matrix(&FastSparseMatrix::from(&m))
            .unwrap_err();
        assert!(matches!(err, LuError::InvalidSparsityPattern { .. }));
    }

    #[test]
    fn reports_singular_pivot() {
        let mut m = SparseMatrix::new(2, 2);
        m.set(0, 0, 0.0).unwrap();
        m.set(1, 1, 1.0).unwrap();
        let mut lu = ProfileLu::new();
        lu.set_matrix(&FastSparseMatrix::from(&m)).unwrap();
        let err = lu.solve(&DVector::from_vec(vec![1.0, 1.0])).unwrap_err();
        assert!(matches!(err, LuError::SingularPivot { row: 0 }));
    }

    #[test]
    fn hart_update_satisfies_secant_condition() {
        let m = tridiag(&[4.0, 4.0, 4.0], &[1.0, 1.0], &[1.0, 1.0]);
        let mut lu = ProfileLu::new();
        lu.set_matrix(&m).unwrap();

        let s = DVector::from_vec(vec![1.0, -1.0, 2.0]);
        let y = DVector::from_vec(vec![3.0, 1.0, 4.0]);
        lu.secant_update_hart(&s, &y).unwrap();

        // After the update, (L·U)·s = y exactly, so solving with y returns s.
        let back = lu.solve(&y).unwrap();
        assert_vec_close(&back, &s, 1e-10);
    }

    #[test]
    fn hart_update_reports_degenerate_row() {
        let m = tridiag(&[1.0, 1.0], &[0.0], &[0.0]);
        let mut lu = ProfileLu::new();
        lu.set_matrix(&m).unwrap();

        // Step has no component inside row 0's profile, yet y demands change.
        let s = DVector::from_vec(vec![0.0, 0.0]);
        let y = DVector::from_vec(vec![1.0, 0.0]);
        let err = lu.secant_update_hart(&s, &y).unwrap_err();
        assert!(matches!(err, LuError::DegenerateSecantUpdate { row: 0 }));
    }

    #[test]
    fn proportional_update_satisfies_secant_condition() {
        let m = tridiag(&[4.0, 5.0, 6.0], &[1.0, -1.0], &[2.0, 0.5]);
        let mut lu = ProfileLu::new();
        lu.set_matrix(&m).unwrap();

        let s = DVector::from_vec(vec![1.0, 2.0, -1.0]);
        let y = DVector::from_vec(vec![5.0, 3.0, -2.0]);
        lu.secant_update_proportional(&s, &y).unwrap();

        let back = lu.solve(&y).unwrap();
        assert_vec_close(&back, &s, 1e-10);
    }

    #[test]
    fn proportional_update_reports_orthogonal_row() {
        let mut m = SparseMatrix::new(2, 2);
        m.set(0, 0, 1.0).unwrap();
        m.set(1, 1, 1.0).unwrap();
        let mut lu = ProfileLu::new();
        lu.set_matrix(&FastSparseMatrix::from(&m)).unwrap();

        // s is orthogonal to row 0 of the factored form.
        let s = DVector::from_vec(vec![0.0, 1.0]);
        let y = DVector::from_vec(vec![1.0, 1.0]);
        let err = lu.secant_update_proportional(&s, &y).unwrap_err();
        assert!(matches!(err, LuError::OrthogonalityError { row: 0 }));
    }

    #[test]
    fn update_before_set_matrix_is_an_error() {
        let mut lu = ProfileLu::new();
        let v = DVector::from_vec(vec![1.0]);
        assert!(matches!(
            lu.secant_update_hart(&v, &v).unwrap_err(),
            LuError::NotInitialized
        ));
        assert!(matches!(
            lu.solve(&v).unwrap_err(),
            LuError::NotInitialized
        ));
    }
}
