//! Artifact generation errors.
//!
//! These never leave the generator as errors: `ArtifactGenerator` logs them
//! and folds them into the artifact's `error` field.

use sx_model::ModelError;

pub type ArtifactResult<T> = Result<T, ArtifactError>;

#[derive(thiserror::Error, Debug)]
pub enum ArtifactError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Nothing to render: {what}")]
    Empty { what: &'static str },
}
