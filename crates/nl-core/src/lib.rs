//! nl-core: stable foundation for the nonlin solver stack.
//!
//! Contains:
//! - numeric (Real + tolerances + float helpers)
//! - mapping (the residual-function interface consumed by the solvers)
//! - sparse (sparse matrix value types shared by the LU and Jacobian engines)
//! - error (shared error types)

pub mod error;
pub mod mapping;
pub mod numeric;
pub mod sparse;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use mapping::{FnMapping, Mapping};
pub use numeric::*;
pub use sparse::{FastSparseMatrix, SparseEntry, SparseMatrix};
