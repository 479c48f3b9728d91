//! Buffered artifact writes.

use std::path::PathBuf;

use sx_artifacts::{ArtifactKind, BoundaryArtifact, DiagnosticsArtifact};
use sx_core::ConfigId;
use tracing::{error, warn};

use crate::StoreResult;
use crate::fsutil::write_atomic;
use crate::store::{ArtifactStore, BoundaryMeta};

/// Pending writes held before an automatic flush.
pub const DEFAULT_WRITE_BUFFER: usize = 5;

#[derive(Debug)]
struct PendingWrite {
    path: PathBuf,
    bytes: Vec<u8>,
}

/// Collects artifact files and writes them in batches.
///
/// Files are written in the order they were queued, each one atomically.
/// Callers must [`BatchWriter::flush`] when an item is done; dropping a
/// writer with pending files flushes them and logs it.
#[derive(Debug)]
pub struct BatchWriter {
    store: ArtifactStore,
    capacity: usize,
    pending: Vec<PendingWrite>,
    written: usize,
}

impl BatchWriter {
    pub fn new(store: ArtifactStore, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            store,
            capacity,
            pending: Vec::with_capacity(capacity),
            written: 0,
        }
    }

    /// Number of queued, unwritten files.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Number of files written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn push(&mut self, path: PathBuf, bytes: Vec<u8>) -> StoreResult<()> {
        self.pending.push(PendingWrite { path, bytes });
        if self.pending.len() >= self.capacity {
            self.flush()?;
        }
        Ok(())
    }

    /// Queue the boundary metadata, figure and image, in that order, so a
    /// boundary that reads as present always has its metadata.
    /// Non-persistable artifacts queue nothing.
    pub fn write_boundary(&mut self, id: ConfigId, artifact: &BoundaryArtifact) -> StoreResult<()> {
        if !artifact.is_persistable() {
            return Ok(());
        }
        let meta = BoundaryMeta {
            radius: artifact.radius,
            error: artifact.error.clone(),
        };
        let path = self.store.boundary_meta_path(id);
        self.push(path, serde_json::to_vec(&meta)?)?;
        if let Some(figure) = &artifact.interactive {
            let path = self.store.boundary_json_path(id);
            self.push(path, serde_json::to_vec(figure)?)?;
        }
        if let Some(image) = &artifact.image {
            let path = self.store.image_path(id, ArtifactKind::Boundary);
            self.push(path, image.clone())?;
        }
        Ok(())
    }

    /// Queue one file per curve, then the index. The index goes last so a
    /// partially written set is never reported as present.
    pub fn write_diagnostics(
        &mut self,
        id: ConfigId,
        artifact: &DiagnosticsArtifact,
    ) -> StoreResult<()> {
        if let Some(image) = &artifact.image {
            let path = self.store.image_path(id, ArtifactKind::Diagnostics);
            self.push(path, image.clone())?;
        }
        if artifact.curves.is_empty() {
            return Ok(());
        }
        for (name, figure) in &artifact.curves {
            let path = self.store.curve_path(id, name);
            self.push(path, serde_json::to_vec(figure)?)?;
        }
        let path = self.store.index_path(id);
        self.push(path, serde_json::to_vec(&artifact.curve_names())?)
    }

    /// Write everything queued. Returns the number of files written.
    ///
    /// On error the remaining queued files are discarded.
    pub fn flush(&mut self) -> StoreResult<usize> {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for write in pending {
            write_atomic(&write.path, &write.bytes)?;
            self.written += 1;
        }
        Ok(count)
    }
}

impl Drop for BatchWriter {
    fn drop(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        warn!(pending = self.pending.len(), "flushing artifact writes on drop");
        if let Err(e) = self.flush() {
            error!(error = %e, "artifact flush on drop failed");
        }
    }
}
