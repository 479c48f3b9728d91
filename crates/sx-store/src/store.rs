//! Artifact storage API.
//!
//! ```text
//! boundary/image/{id}.png
//! boundary/json/{id}.json
//! boundary/json/{id}.meta.json
//! diagnostics/image/{id}.png
//! diagnostics/json/{id}/{curve}.json
//! diagnostics/json/{id}/index.json
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sx_artifacts::ArtifactKind;
use sx_core::ConfigId;

use crate::StoreResult;
use crate::writer::BatchWriter;

pub const INDEX_FILE: &str = "index.json";

/// File-name-safe form of a curve name (`1/L_grad_B` → `1_L_grad_B`).
pub fn sanitize_curve_name(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// Stored boundary, as written.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBoundary {
    pub image: Option<Vec<u8>>,
    pub interactive: Option<Value>,
    pub radius: Option<f64>,
    /// Note kept with a degraded boundary.
    pub error: Option<String>,
}

/// Boundary fields that are neither image nor figure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct BoundaryMeta {
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Stored diagnostics, as written.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDiagnostics {
    pub image: Option<Vec<u8>>,
    pub curves: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(root_dir: PathBuf) -> StoreResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    pub fn image_path(&self, id: ConfigId, kind: ArtifactKind) -> PathBuf {
        self.root_dir
            .join(kind.dir_name())
            .join("image")
            .join(format!("{id}.png"))
    }

    pub fn boundary_json_path(&self, id: ConfigId) -> PathBuf {
        self.root_dir
            .join(ArtifactKind::Boundary.dir_name())
            .join("json")
            .join(format!("{id}.json"))
    }

    pub fn boundary_meta_path(&self, id: ConfigId) -> PathBuf {
        self.root_dir
            .join(ArtifactKind::Boundary.dir_name())
            .join("json")
            .join(format!("{id}.meta.json"))
    }

    pub fn diagnostics_dir(&self, id: ConfigId) -> PathBuf {
        self.root_dir
            .join(ArtifactKind::Diagnostics.dir_name())
            .join("json")
            .join(id.to_string())
    }

    pub fn curve_path(&self, id: ConfigId, curve: &str) -> PathBuf {
        self.diagnostics_dir(id)
            .join(format!("{}.json", sanitize_curve_name(curve)))
    }

    pub fn index_path(&self, id: ConfigId) -> PathBuf {
        self.diagnostics_dir(id).join(INDEX_FILE)
    }

    /// Presence check. Diagnostics count only once their index is written.
    pub fn exists(&self, id: ConfigId, kind: ArtifactKind) -> bool {
        let json = match kind {
            ArtifactKind::Boundary => self.boundary_json_path(id),
            ArtifactKind::Diagnostics => self.index_path(id),
        };
        json.exists() || self.image_path(id, kind).exists()
    }

    /// Both artifacts present.
    pub fn is_complete(&self, id: ConfigId) -> bool {
        ArtifactKind::ALL.iter().all(|&kind| self.exists(id, kind))
    }

    /// Completeness of each ID, checked in parallel.
    pub fn scan_complete(&self, ids: &[ConfigId]) -> Vec<bool> {
        ids.par_iter().map(|&id| self.is_complete(id)).collect()
    }

    /// Buffered writer flushing every `capacity` pending files.
    pub fn writer(&self, capacity: usize) -> BatchWriter {
        BatchWriter::new(self.clone(), capacity)
    }

    pub fn load_boundary(&self, id: ConfigId) -> StoreResult<Option<StoredBoundary>> {
        let image = read_optional(&self.image_path(id, ArtifactKind::Boundary))?;
        let interactive = match read_optional(&self.boundary_json_path(id))? {
            Some(bytes) => Some(serde_json::from_slice(&bytes)?),
            None => None,
        };
        if image.is_none() && interactive.is_none() {
            return Ok(None);
        }
        // Stores written before metadata was kept have no meta file.
        let meta: BoundaryMeta = match read_optional(&self.boundary_meta_path(id))? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => BoundaryMeta::default(),
        };
        Ok(Some(StoredBoundary {
            image,
            interactive,
            radius: meta.radius,
            error: meta.error,
        }))
    }

    pub fn load_diagnostics(&self, id: ConfigId) -> StoreResult<Option<StoredDiagnostics>> {
        let image = read_optional(&self.image_path(id, ArtifactKind::Diagnostics))?;
        let mut curves = BTreeMap::new();
        if let Some(index) = read_optional(&self.index_path(id))? {
            let names: Vec<String> = serde_json::from_slice(&index)?;
            for name in names {
                let bytes = fs::read(self.curve_path(id, &name))?;
                curves.insert(name, serde_json::from_slice(&bytes)?);
            }
        } else if image.is_none() {
            return Ok(None);
        }
        Ok(Some(StoredDiagnostics { image, curves }))
    }

    /// Remove everything stored for `id`.
    pub fn delete(&self, id: ConfigId) -> StoreResult<()> {
        for kind in ArtifactKind::ALL {
            remove_if_exists(&self.image_path(id, kind))?;
        }
        remove_if_exists(&self.boundary_json_path(id))?;
        remove_if_exists(&self.boundary_meta_path(id))?;
        let dir = self.diagnostics_dir(id);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}

fn read_optional(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_if_exists(path: &Path) -> StoreResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
