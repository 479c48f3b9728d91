//! sx-artifacts: boundary and diagnostics artifacts for one configuration.
//!
//! The generator turns a model handle into plain data: PNG bytes and Plotly
//! figure documents. It never touches the filesystem.

pub mod error;
pub mod generator;
pub mod plotly;
pub mod render;
pub mod types;

pub use error::{ArtifactError, ArtifactResult};
pub use generator::{ArtifactGenerator, DEFAULT_RADII};
pub use types::{
    ArtifactKind, BOUNDARY_DEGRADED_MESSAGE, BoundaryArtifact, DiagnosticsArtifact,
    GENERIC_FAILURE_MESSAGE,
};
