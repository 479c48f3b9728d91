//! Batch precomputation.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use serde::Serialize;
use sx_artifacts::{ArtifactGenerator, ArtifactKind, BoundaryArtifact, DiagnosticsArtifact};
use sx_core::{ConfigId, ConfigurationRecord};
use sx_model::ModelBuilder;
use sx_source::ConfigSource;
use sx_store::{ArtifactStore, BatchWriter, ProgressLedger, ProgressState, StoreResult};
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::memory::{MemoryGauge, ProcMeminfoGauge};
use crate::pool::{JobOutcome, WorkerPool};
use crate::progress::{PipelineEvent, PipelineStage};

/// What happened to one configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Both artifacts were already stored.
    Skipped,
    Succeeded,
    /// One artifact was produced and stored, the other was not.
    Partial { failed: ArtifactKind },
    Failed { reason: String },
    TimedOut,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Skipped | ItemOutcome::Succeeded)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Skipped => "Skipped",
            ItemOutcome::Succeeded => "Completed",
            ItemOutcome::Partial { .. } => "Partial",
            ItemOutcome::Failed { .. } => "Failed",
            ItemOutcome::TimedOut => "Timed out",
        }
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemOutcome::Partial { failed } => write!(f, "Partial ({failed} failed)"),
            ItemOutcome::Failed { reason } => write!(f, "Failed ({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Totals for one run. `completed` and `succeeded` include progress carried
/// over from the ledger; the per-status counters cover this run only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: u64,
    pub completed: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub partial: u64,
    pub failed: u64,
    pub timed_out: u64,
    /// Offset the run started from.
    pub resumed_from: u64,
    pub batches: u64,
    /// Items handled in this run.
    pub processed: u64,
    pub run_elapsed_s: f64,
    /// Wall time carried over from the ledger.
    pub prior_elapsed_s: f64,
    /// Cumulative wall time including earlier runs.
    pub total_elapsed_s: f64,
}

impl RunSummary {
    fn record(&mut self, outcome: &ItemOutcome) {
        self.completed += 1;
        self.processed += 1;
        if outcome.is_success() {
            self.succeeded += 1;
        }
        match outcome {
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Partial { .. } => self.partial += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
            ItemOutcome::TimedOut => self.timed_out += 1,
            ItemOutcome::Succeeded => {}
        }
    }

    fn set_elapsed(&mut self, run_elapsed_s: f64) {
        self.run_elapsed_s = run_elapsed_s;
        self.total_elapsed_s = self.prior_elapsed_s + run_elapsed_s;
    }

    /// Items per second since the first run started. Counts and wall time
    /// carried over from the ledger keep it steady across restarts.
    pub fn rate(&self) -> f64 {
        if self.total_elapsed_s > 0.0 {
            self.completed as f64 / self.total_elapsed_s
        } else {
            0.0
        }
    }

    /// Estimated hours until every configuration is completed.
    pub fn eta_hours(&self) -> f64 {
        let rate = self.rate();
        if rate > 0.0 {
            self.total.saturating_sub(self.completed) as f64 / rate / 3600.0
        } else {
            0.0
        }
    }

    pub fn seconds_per_item(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.run_elapsed_s / self.processed as f64
        }
    }
}

/// Contiguous batch ranges covering `start..total`.
pub fn batch_ranges(total: u64, batch_size: u64, start: u64) -> Vec<Range<u64>> {
    let batch_size = batch_size.max(1);
    let mut ranges = Vec::new();
    let mut lo = start;
    while lo < total {
        let hi = (lo + batch_size).min(total);
        ranges.push(lo..hi);
        lo = hi;
    }
    ranges
}

/// Shared state an item job needs on its execution thread.
struct ItemContext {
    builder: Arc<dyn ModelBuilder>,
    generator: ArtifactGenerator,
    store: ArtifactStore,
    write_buffer_len: usize,
}

impl ItemContext {
    fn process(&self, record: &ConfigurationRecord) -> ItemOutcome {
        let id = record.id;
        if let Err(e) = record.validate() {
            error!(config = %id, error = %e, "invalid configuration");
            return ItemOutcome::Failed {
                reason: format!("invalid configuration: {e}"),
            };
        }
        let model = match self.builder.build(record) {
            Ok(model) => model,
            Err(e) => {
                error!(config = %id, builder = self.builder.name(), error = %e, "model construction failed");
                return ItemOutcome::Failed {
                    reason: format!("model construction failed: {e}"),
                };
            }
        };

        let boundary = self.generator.generate_boundary(model.as_ref());
        let diagnostics = self.generator.generate_diagnostics(model.as_ref());

        // Files of an earlier, unfinished attempt must not outlive this one.
        if let Err(e) = self.store.delete(id) {
            error!(config = %id, error = %e, "clearing stale artifacts failed");
            return ItemOutcome::Failed {
                reason: format!("store cleanup failed: {e}"),
            };
        }
        let mut writer = self.store.writer(self.write_buffer_len);
        let queued = queue_artifacts(&mut writer, id, &boundary, &diagnostics);
        let flushed = writer.flush();
        if let Err(e) = queued.and(flushed.map(|_| ())) {
            error!(config = %id, error = %e, "writing artifacts failed");
            return ItemOutcome::Failed {
                reason: format!("store write failed: {e}"),
            };
        }

        match (boundary.is_persistable(), diagnostics.is_persistable()) {
            (true, true) => ItemOutcome::Succeeded,
            (false, true) => ItemOutcome::Partial {
                failed: ArtifactKind::Boundary,
            },
            (true, false) => ItemOutcome::Partial {
                failed: ArtifactKind::Diagnostics,
            },
            (false, false) => ItemOutcome::Failed {
                reason: "no artifact could be generated".to_string(),
            },
        }
    }
}

fn queue_artifacts(
    writer: &mut BatchWriter,
    id: ConfigId,
    boundary: &BoundaryArtifact,
    diagnostics: &DiagnosticsArtifact,
) -> StoreResult<()> {
    writer.write_boundary(id, boundary)?;
    writer.write_diagnostics(id, diagnostics)
}

pub struct BatchScheduler {
    config: PipelineConfig,
    source: Arc<dyn ConfigSource>,
    ledger: ProgressLedger,
    gauge: Box<dyn MemoryGauge>,
    context: Arc<ItemContext>,
}

impl BatchScheduler {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn ConfigSource>,
        builder: Arc<dyn ModelBuilder>,
        store: ArtifactStore,
        ledger: ProgressLedger,
    ) -> Self {
        let context = ItemContext {
            builder,
            generator: ArtifactGenerator::new(config.radii.clone()),
            store,
            write_buffer_len: config.write_buffer_len,
        };
        Self {
            config,
            source,
            ledger,
            gauge: Box::new(ProcMeminfoGauge::default()),
            context: Arc::new(context),
        }
    }

    pub fn with_memory_gauge(mut self, gauge: Box<dyn MemoryGauge>) -> Self {
        self.gauge = gauge;
        self
    }

    /// Replace the artifact generator, e.g. to use a coarser mesh.
    pub fn with_generator(mut self, generator: ArtifactGenerator) -> Self {
        let context = ItemContext {
            builder: Arc::clone(&self.context.builder),
            generator,
            store: self.context.store.clone(),
            write_buffer_len: self.context.write_buffer_len,
        };
        self.context = Arc::new(context);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> PipelineResult<RunSummary> {
        self.run_with_progress(None)
    }

    /// Precompute every configuration not yet stored, resuming from the
    /// ledger.
    pub fn run_with_progress(
        &self,
        mut progress_cb: Option<&mut dyn FnMut(PipelineEvent)>,
    ) -> PipelineResult<RunSummary> {
        self.config.validate()?;
        let started = Instant::now();
        let mut emit = |event: PipelineEvent| {
            if let Some(cb) = progress_cb.as_deref_mut() {
                cb(event);
            }
        };

        emit(PipelineEvent::stage(
            PipelineStage::LoadingConfigurations,
            started.elapsed().as_secs_f64(),
            0,
            0,
            None,
        ));
        let records = self.source.load_all()?;
        let total = records.len() as u64;
        info!(total, "loaded configurations");

        let batch_size = self.config.batch_size as u64;
        let (prior, resume_from) = match self.ledger.load() {
            Some(state) => {
                let offset = state.resume_offset(batch_size);
                info!(
                    completed = state.completed,
                    last_batch = state.last_batch,
                    offset,
                    "resuming from saved progress"
                );
                (state, offset)
            }
            None => {
                info!(path = %self.ledger.path().display(), "no saved progress, starting from the beginning");
                (ProgressState::default(), 0)
            }
        };

        let mut summary = RunSummary {
            total,
            completed: prior.completed,
            succeeded: prior.success_count,
            resumed_from: resume_from,
            prior_elapsed_s: prior.elapsed_time,
            ..RunSummary::default()
        };
        emit(PipelineEvent::stage(
            PipelineStage::Resuming,
            started.elapsed().as_secs_f64(),
            summary.completed,
            total,
            Some(format!("starting at offset {resume_from}")),
        ));

        let workers = self.config.worker_count();
        let pool: WorkerPool<ConfigId, ItemOutcome> =
            WorkerPool::new(workers, self.config.item_timeout())?;
        info!(
            workers = pool.size(),
            batch_size,
            timeout_s = self.config.item_timeout_s,
            radii = ?self.context.generator.radii(),
            "worker pool started"
        );

        for range in batch_ranges(total, batch_size, resume_from) {
            if let Some(max) = self.config.max_batches
                && summary.batches >= max
            {
                info!(batches = summary.batches, "batch limit reached, stopping");
                break;
            }

            self.wait_for_memory(&mut emit, started, &summary);

            let batch_start = range.start;
            let batch = &records[range.start as usize..range.end as usize];
            info!(
                start = range.start,
                end = range.end,
                "processing batch"
            );
            emit(PipelineEvent {
                batch_start: Some(batch_start),
                ..PipelineEvent::stage(
                    PipelineStage::RunningBatch,
                    started.elapsed().as_secs_f64(),
                    summary.completed,
                    total,
                    None,
                )
            });

            let ids: Vec<ConfigId> = batch.iter().map(|r| r.id).collect();
            let complete = self.context.store.scan_complete(&ids);

            let mut in_flight = 0usize;
            for (record, done) in batch.iter().zip(complete) {
                if done {
                    debug!(config = %record.id, "already stored");
                    self.finish_item(record.id, ItemOutcome::Skipped, &mut summary, started, &mut emit);
                    continue;
                }
                let context = Arc::clone(&self.context);
                let record = record.clone();
                pool.submit(record.id, move || context.process(&record))?;
                in_flight += 1;
            }

            for _ in 0..in_flight {
                let report = pool.recv()?;
                let outcome = match report.outcome {
                    JobOutcome::Completed(outcome) => outcome,
                    JobOutcome::TimedOut => ItemOutcome::TimedOut,
                    JobOutcome::Crashed(reason) => {
                        error!(config = %report.key, reason = %reason, "item crashed");
                        ItemOutcome::Failed { reason }
                    }
                };
                debug!(config = %report.key, elapsed_s = report.elapsed.as_secs_f64(), "item finished");
                self.finish_item(report.key, outcome, &mut summary, started, &mut emit);
            }

            summary.batches += 1;
            let state = ProgressState {
                completed: summary.completed,
                success_count: summary.succeeded,
                last_batch: batch_start,
                elapsed_time: summary.prior_elapsed_s + started.elapsed().as_secs_f64(),
                updated_at: None,
            };
            if let Err(e) = self.ledger.save(&state) {
                error!(path = %self.ledger.path().display(), error = %e, "failed to save progress");
            }
            emit(PipelineEvent {
                batch_start: Some(batch_start),
                ..PipelineEvent::stage(
                    PipelineStage::BatchCompleted,
                    started.elapsed().as_secs_f64(),
                    summary.completed,
                    total,
                    None,
                )
            });
        }

        summary.set_elapsed(started.elapsed().as_secs_f64());
        log_summary(&summary);
        emit(PipelineEvent::stage(
            PipelineStage::Completed,
            summary.run_elapsed_s,
            summary.completed,
            total,
            None,
        ));
        Ok(summary)
    }

    fn wait_for_memory(
        &self,
        emit: &mut impl FnMut(PipelineEvent),
        started: Instant,
        summary: &RunSummary,
    ) {
        let Some(pct) = self.gauge.utilization_pct() else {
            return;
        };
        if pct <= self.config.memory_high_water_pct {
            return;
        }
        let cooldown = self.config.memory_cooldown();
        warn!(
            memory_pct = pct,
            cooldown_s = cooldown.as_secs_f64(),
            "high memory usage, pausing before next batch"
        );
        emit(PipelineEvent::stage(
            PipelineStage::BackpressureWait,
            started.elapsed().as_secs_f64(),
            summary.completed,
            summary.total,
            Some(format!("memory at {pct:.1}%")),
        ));
        thread::sleep(cooldown);
    }

    fn finish_item(
        &self,
        id: ConfigId,
        outcome: ItemOutcome,
        summary: &mut RunSummary,
        started: Instant,
        emit: &mut impl FnMut(PipelineEvent),
    ) {
        summary.record(&outcome);
        let elapsed = started.elapsed().as_secs_f64();
        summary.set_elapsed(elapsed);
        let line = format!(
            "[{}/{}] {} Config {} - {:.2} configs/sec - Est. remaining: {:.2} hours",
            summary.completed,
            summary.total,
            outcome.label(),
            id,
            summary.rate(),
            summary.eta_hours()
        );
        match &outcome {
            ItemOutcome::TimedOut => warn!("{line}"),
            ItemOutcome::Failed { reason } => warn!(reason = %reason, "{line}"),
            _ => info!("{line}"),
        }
        emit(PipelineEvent {
            config_id: Some(id),
            outcome: Some(outcome),
            ..PipelineEvent::stage(
                PipelineStage::ItemFinished,
                elapsed,
                summary.completed,
                summary.total,
                None,
            )
        });
    }
}

fn log_summary(summary: &RunSummary) {
    info!(
        total_elapsed_s = summary.total_elapsed_s,
        run_elapsed_s = summary.run_elapsed_s,
        succeeded = summary.succeeded,
        completed = summary.completed,
        total = summary.total,
        seconds_per_item = summary.seconds_per_item(),
        skipped = summary.skipped,
        partial = summary.partial,
        failed = summary.failed,
        timed_out = summary.timed_out,
        "precomputation finished: {}/{} configurations successful",
        summary.succeeded,
        summary.total
    );
}
