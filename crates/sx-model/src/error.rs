//! Model errors.

use sx_core::CoreError;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by model construction and sampling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The boundary root-find could not bracket a sign change at this radius.
    ///
    /// Callers treat this as recoverable and retry with another radius.
    #[error("f(a) and f(b) must have different signs (r = {r})")]
    NoSignChange { r: f64 },

    /// The record cannot be turned into a model.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] CoreError),

    /// Invalid argument passed to a sampler.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Degenerate geometry or a non-finite intermediate.
    #[error("Numerical failure in {what}")]
    Numerical { what: &'static str },

    /// Failure reported by an external model backend.
    #[error("Backend error: {message}")]
    Backend { message: String },
}

impl ModelError {
    /// True for the failed-bracketing condition that radius fallback handles.
    pub fn is_no_sign_change(&self) -> bool {
        matches!(self, ModelError::NoSignChange { .. })
    }
}
