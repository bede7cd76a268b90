//! nl-jacobian: sparse finite-difference Jacobian assembly.
//!
//! The calculator discovers, once per sparsity pattern, a grouping of columns
//! that can be perturbed simultaneously in a single residual evaluation, then
//! refills the matrix with the minimum number of evaluations. Providers
//! orchestrate "evaluate -> build or refresh -> optionally trim" behind one
//! trait, and trimmers post-process freshly computed Jacobians to reduce
//! fill-in before the pattern is locked for incremental reuse.

pub mod calculator;
pub mod error;
pub mod provider;
pub mod trimmer;

pub use calculator::SparseJacobianCalculator;
pub use error::{JacobianError, JacobianResult};
pub use provider::{DenseFdProvider, JacobianProvider, SparseFdProvider};
pub use trimmer::{BandTrimmer, JacobianTrimmer, ThresholdTrimmer};
