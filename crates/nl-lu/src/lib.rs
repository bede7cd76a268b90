//! nl-lu: profile LU factorization with envelope-preserving secant updates.
//!
//! The factorizer consumes a sparse matrix whose index pattern is fixed (the
//! envelope), stores the triangular factors in packed profile form, and keeps
//! the factorization cached until the numeric contents change. Two incremental
//! update algorithms adjust the factored form directly so that repeated
//! quasi-Newton steps never pay for a full refactorization.

pub mod error;
pub mod factorizer;

pub use error::{LuError, LuResult};
pub use factorizer::ProfileLu;
