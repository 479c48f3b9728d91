//! Pipeline settings.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sx_artifacts::DEFAULT_RADII;
use sx_store::DEFAULT_WRITE_BUFFER;

use crate::error::{PipelineError, PipelineResult};

/// Available parallelism minus one, at least one.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

/// Settings for a precompute run. Every field has a default, so a YAML
/// file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub batch_size: usize,
    /// Worker override; `None` uses [`default_worker_count`].
    pub workers: Option<usize>,
    pub item_timeout_s: f64,
    pub memory_high_water_pct: f64,
    pub memory_cooldown_s: f64,
    pub write_buffer_len: usize,
    pub radii: Vec<f64>,
    /// Stop after this many batches in one run.
    pub max_batches: Option<u64>,
    pub store_root: PathBuf,
    pub ledger_path: PathBuf,
    pub database: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            workers: None,
            item_timeout_s: 600.0,
            memory_high_water_pct: 90.0,
            memory_cooldown_s: 60.0,
            write_buffer_len: DEFAULT_WRITE_BUFFER,
            radii: DEFAULT_RADII.to_vec(),
            max_batches: None,
            store_root: PathBuf::from("precomputed"),
            ledger_path: PathBuf::from(sx_store::ledger::DEFAULT_LEDGER_FILE),
            database: PathBuf::from("XGStels.db"),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| PipelineError::ConfigFileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|source| PipelineError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidInput("batch_size must be positive".into()));
        }
        if self.workers == Some(0) {
            return Err(PipelineError::InvalidInput("workers must be positive".into()));
        }
        if !Duration::try_from_secs_f64(self.item_timeout_s).is_ok_and(|d| !d.is_zero()) {
            return Err(PipelineError::InvalidInput(
                "item_timeout_s must be a positive, representable number of seconds".into(),
            ));
        }
        if Duration::try_from_secs_f64(self.memory_cooldown_s).is_err() {
            return Err(PipelineError::InvalidInput(
                "memory_cooldown_s must be a non-negative, representable number of seconds".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.memory_high_water_pct) {
            return Err(PipelineError::InvalidInput(
                "memory_high_water_pct must be between 0 and 100".into(),
            ));
        }
        if self.radii.is_empty() || self.radii.iter().any(|r| !(r.is_finite() && *r > 0.0)) {
            return Err(PipelineError::InvalidInput(
                "radii must be a non-empty list of positive numbers".into(),
            ));
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_worker_count)
    }

    /// Saturates on values [`PipelineConfig::validate`] rejects.
    pub fn item_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.item_timeout_s).unwrap_or(Duration::MAX)
    }

    pub fn memory_cooldown(&self) -> Duration {
        Duration::try_from_secs_f64(self.memory_cooldown_s).unwrap_or(Duration::ZERO)
    }
}
