//! Error types for the Newton engine.
//!
//! Only structural problems are errors here. Numerical non-convergence is an
//! expected outcome and travels as a status code, never as an `Err`.

use nl_core::CoreError;
use nl_jacobian::JacobianError;
use nl_lu::LuError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NewtonError {
    #[error("Configuration error: {what}")]
    Config { what: String },

    #[error("Numeric error: {what}")]
    Numeric { what: String },

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("LU error: {0}")]
    Lu(#[from] LuError),

    #[error("Jacobian error: {0}")]
    Jacobian(#[from] JacobianError),
}

pub type NewtonResult<T> = Result<T, NewtonError>;
