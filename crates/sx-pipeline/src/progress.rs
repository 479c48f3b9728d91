use sx_core::ConfigId;

use crate::scheduler::ItemOutcome;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStage {
    LoadingConfigurations,
    Resuming,
    BackpressureWait,
    RunningBatch,
    ItemFinished,
    BatchCompleted,
    Completed,
}

#[derive(Debug, Clone)]
pub struct PipelineEvent {
    pub stage: PipelineStage,
    pub elapsed_wall_s: f64,
    pub completed: u64,
    pub total: u64,
    /// Start offset of the current batch.
    pub batch_start: Option<u64>,
    pub config_id: Option<ConfigId>,
    pub outcome: Option<ItemOutcome>,
    pub message: Option<String>,
}

impl PipelineEvent {
    pub fn stage(
        stage: PipelineStage,
        elapsed_wall_s: f64,
        completed: u64,
        total: u64,
        message: Option<String>,
    ) -> Self {
        Self {
            stage,
            elapsed_wall_s,
            completed,
            total,
            batch_start: None,
            config_id: None,
            outcome: None,
            message,
        }
    }

    pub fn fraction_complete(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}
