//! Batch precomputation and artifact serving.
//!
//! [`BatchScheduler`] walks the configuration table in fixed-size batches,
//! fans items out to a [`WorkerPool`], persists artifacts through the store
//! and checkpoints progress after every batch. [`ArtifactService`] answers
//! single requests from the store, generating on demand when needed.

pub mod config;
pub mod error;
pub mod memory;
pub mod pool;
pub mod progress;
pub mod scheduler;
pub mod service;

pub use config::{PipelineConfig, default_worker_count};
pub use error::{PipelineError, PipelineResult};
pub use memory::{FixedMemoryGauge, MemoryGauge, ProcMeminfoGauge};
pub use pool::{JobOutcome, JobReport, WorkerPool};
pub use progress::{PipelineEvent, PipelineStage};
pub use scheduler::{BatchScheduler, ItemOutcome, RunSummary, batch_ranges};
pub use service::{ArtifactResponse, ArtifactService};
