//! Residual-function interface consumed by the Jacobian and Newton engines.

use crate::error::{CoreError, CoreResult};
use crate::numeric::Real;
use nalgebra::DVector;

/// A vector-valued residual function F in F(x) = 0.
///
/// Implementations may cache work between evaluations, hence `&mut self`.
/// Square nonlinear systems require `input_size() == output_size()`.
pub trait Mapping {
    /// Dimension of the argument vector.
    fn input_size(&self) -> usize;

    /// Dimension of the residual vector.
    fn output_size(&self) -> usize;

    /// Evaluate F at `x`.
    fn map(&mut self, x: &DVector<Real>) -> CoreResult<DVector<Real>>;

    /// Dimension of a square system.
    ///
    /// Errors when input and output dimensions disagree.
    fn square_size(&self) -> CoreResult<usize> {
        if self.input_size() != self.output_size() {
            return Err(CoreError::SizeMismatch {
                what: "square mapping",
                expected: self.input_size(),
                found: self.output_size(),
            });
        }
        Ok(self.input_size())
    }
}

/// Adapts a closure plus a dimension into a square [`Mapping`].
pub struct FnMapping<F> {
    size: usize,
    f: F,
}

impl<F> FnMapping<F>
where
    F: FnMut(&DVector<Real>) -> CoreResult<DVector<Real>>,
{
    pub fn new(size: usize, f: F) -> Self {
        Self { size, f }
    }
}

impl<F> Mapping for FnMapping<F>
where
    F: FnMut(&DVector<Real>) -> CoreResult<DVector<Real>>,
{
    fn input_size(&self) -> usize {
        self.size
    }

    fn output_size(&self) -> usize {
        self.size
    }

    fn map(&mut self, x: &DVector<Real>) -> CoreResult<DVector<Real>> {
        if x.len() != self.size {
            return Err(CoreError::SizeMismatch {
                what: "mapping argument",
                expected: self.size,
                found: x.len(),
            });
        }
        (self.f)(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fn_mapping_evaluates() {
        let mut m = FnMapping::new(2, |x: &DVector<Real>| {
            Ok(DVector::from_vec(vec![x[0] + x[1], x[0] * x[1]]))
        });
        assert_eq!(m.square_size().unwrap(), 2);
        let f = m.map(&DVector::from_vec(vec![2.0, 3.0])).unwrap();
        assert_eq!(f[0], 5.0);
        assert_eq!(f[1], 6.0);
    }

    #[test]
    fn fn_mapping_rejects_wrong_size() {
        let mut m = FnMapping::new(2, |x: &DVector<Real>| Ok(x.clone()));
        let err = m.map(&DVector::zeros(3)).unwrap_err();
        assert!(matches!(err, CoreError::SizeMismatch { .. }));
    }
}
