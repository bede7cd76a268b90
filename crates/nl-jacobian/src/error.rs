//! Error types for Jacobian assembly.

use nl_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JacobianError {
    #[error("Jacobian setup error: {what}")]
    Setup { what: String },

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

pub type JacobianResult<T> = Result<T, JacobianError>;
