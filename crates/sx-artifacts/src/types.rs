//! Artifact data types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shown when no candidate radius produced a boundary surface.
pub const BOUNDARY_DEGRADED_MESSAGE: &str =
    "Could not generate 3D boundary visualization for this configuration.";

/// Shown for any other failure; details stay in the logs.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate visualization";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Boundary,
    Diagnostics,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Boundary, ArtifactKind::Diagnostics];

    /// Top-level directory name in the artifact store.
    pub fn dir_name(self) -> &'static str {
        match self {
            ArtifactKind::Boundary => "boundary",
            ArtifactKind::Diagnostics => "diagnostics",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Rendered boundary surface of one configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundaryArtifact {
    /// PNG bytes.
    pub image: Option<Vec<u8>>,
    /// Plotly surface figure.
    pub interactive: Option<Value>,
    /// Minor radius the surface was computed at.
    pub radius: Option<f64>,
    pub error: Option<String>,
}

impl BoundaryArtifact {
    pub fn failed() -> Self {
        Self {
            error: Some(GENERIC_FAILURE_MESSAGE.to_string()),
            ..Self::default()
        }
    }

    /// True when there is anything worth writing to the store.
    pub fn is_persistable(&self) -> bool {
        self.image.is_some() || self.interactive.is_some()
    }
}

/// Diagnostic curves of one configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticsArtifact {
    /// PNG bytes, only produced by the whole-model fallback rendering.
    pub image: Option<Vec<u8>>,
    /// Plotly line figures keyed by curve name.
    pub curves: BTreeMap<String, Value>,
    pub error: Option<String>,
}

impl DiagnosticsArtifact {
    pub fn failed() -> Self {
        Self {
            error: Some(GENERIC_FAILURE_MESSAGE.to_string()),
            ..Self::default()
        }
    }

    pub fn is_persistable(&self) -> bool {
        self.image.is_some() || !self.curves.is_empty()
    }

    pub fn curve_names(&self) -> Vec<&str> {
        self.curves.keys().map(String::as_str).collect()
    }
}
