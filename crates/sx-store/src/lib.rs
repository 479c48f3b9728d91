//! sx-store: precomputed artifact storage and the progress ledger.

pub mod fsutil;
pub mod ledger;
pub mod store;
pub mod writer;

pub use ledger::{ProgressLedger, ProgressState};
pub use store::{ArtifactStore, StoredBoundary, StoredDiagnostics, sanitize_curve_name};
pub use writer::{BatchWriter, DEFAULT_WRITE_BUFFER};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid path: {message}")]
    InvalidPath { message: String },
}
