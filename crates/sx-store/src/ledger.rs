//! Persisted pipeline checkpoint.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::StoreResult;
use crate::fsutil::write_atomic;

pub const DEFAULT_LEDGER_FILE: &str = "precomputation_progress.json";

/// Progress after the last completed batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Items processed, including skipped and failed ones.
    pub completed: u64,
    pub success_count: u64,
    /// Start offset of the last completed batch.
    pub last_batch: u64,
    /// Cumulative wall time in seconds.
    pub elapsed_time: f64,
    /// RFC 3339 time of the last save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ProgressState {
    /// Offset the next run starts from.
    pub fn resume_offset(&self, batch_size: u64) -> u64 {
        self.last_batch + batch_size
    }
}

#[derive(Debug, Clone)]
pub struct ProgressLedger {
    path: PathBuf,
}

impl ProgressLedger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last saved state. A missing ledger is `None`; so is one that cannot
    /// be read or parsed, after a warning.
    pub fn load(&self) -> Option<ProgressState> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable progress ledger, starting over");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt progress ledger, starting over");
                None
            }
        }
    }

    /// Atomically replace the ledger, stamping `updated_at`.
    pub fn save(&self, state: &ProgressState) -> StoreResult<()> {
        let stamped = ProgressState {
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
            ..state.clone()
        };
        let json = serde_json::to_string_pretty(&stamped)?;
        write_atomic(&self.path, json.as_bytes())
    }

    pub fn clear(&self) -> StoreResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_legacy_ledger_without_timestamp() {
        let state: ProgressState = serde_json::from_str(
            r#"{"completed": 200, "success_count": 198, "last_batch": 100, "elapsed_time": 12.5}"#,
        )
        .expect("parse");
        assert_eq!(state.completed, 200);
        assert_eq!(state.updated_at, None);
        assert_eq!(state.resume_offset(100), 200);
    }
}
