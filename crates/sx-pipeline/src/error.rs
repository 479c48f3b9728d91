//! Error types for the pipeline layer.

use std::path::PathBuf;

use sx_core::ConfigId;

/// Pipeline error type wrapping the lower crates.
///
/// Only `Source` and `WorkerPool` abort a precompute run; everything that
/// goes wrong inside one item is caught and counted instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration source error: {0}")]
    Source(String),

    #[error("Configuration not found: {id}")]
    ConfigNotFound { id: ConfigId },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Worker pool error: {message}")]
    WorkerPool { message: String },

    #[error("Failed to read config file: {path}")]
    ConfigFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl From<sx_source::SourceError> for PipelineError {
    fn from(err: sx_source::SourceError) -> Self {
        PipelineError::Source(err.to_string())
    }
}

impl From<sx_store::StoreError> for PipelineError {
    fn from(err: sx_store::StoreError) -> Self {
        PipelineError::Store(err.to_string())
    }
}
