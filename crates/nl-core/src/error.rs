use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Size mismatch for {what}: expected {expected}, got {found}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Residual evaluation failed: {what}")]
    Evaluation { what: String },
}
