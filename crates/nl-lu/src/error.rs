//! Error types for the LU engine.

use thiserror::Error;

/// Errors raised by [`crate::ProfileLu`].
#[derive(Error, Debug)]
pub enum LuError {
    #[error("Invalid sparsity pattern: {what}")]
    InvalidSparsityPattern { what: String },

    #[error("No matrix has been loaded")]
    NotInitialized,

    #[error("Size mismatch: expected {expected}, got {found}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("Zero pivot while factorizing row {row}")]
    SingularPivot { row: usize },

    #[error("Secant update denominator vanished at row {row}")]
    DegenerateSecantUpdate { row: usize },

    #[error("Update direction orthogonal to row {row}")]
    OrthogonalityError { row: usize },
}

pub type LuResult<T> = Result<T, LuError>;
