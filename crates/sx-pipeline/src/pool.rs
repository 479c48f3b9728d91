//! Bounded worker pool with per-job timeouts.
//!
//! Each pool worker supervises one job at a time: the job body runs on its
//! own execution thread and the worker waits for it with a deadline. A job
//! that misses the deadline is reported as timed out and its thread is left
//! detached; the worker moves on to the next job.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

type Task<R> = Box<dyn FnOnce() -> R + Send + 'static>;

struct Job<K, R> {
    key: K,
    task: Task<R>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome<R> {
    Completed(R),
    TimedOut,
    /// The job panicked or its thread could not be started.
    Crashed(String),
}

#[derive(Debug, Clone)]
pub struct JobReport<K, R> {
    pub key: K,
    pub outcome: JobOutcome<R>,
    pub elapsed: Duration,
}

pub struct WorkerPool<K, R> {
    jobs: Option<Sender<Job<K, R>>>,
    reports: Receiver<JobReport<K, R>>,
    workers: Vec<JoinHandle<()>>,
}

impl<K, R> WorkerPool<K, R>
where
    K: Clone + Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    /// Start `workers` supervisor threads. Failing to start any of them is
    /// an error.
    pub fn new(workers: usize, timeout: Duration) -> PipelineResult<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job<K, R>>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (report_tx, report_rx) = mpsc::channel();

        let mut handles = Vec::with_capacity(workers.max(1));
        for index in 0..workers.max(1) {
            let job_rx = Arc::clone(&job_rx);
            let report_tx = report_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("sx-worker-{index}"))
                .spawn(move || supervise(index, job_rx, report_tx, timeout))
                .map_err(|e| PipelineError::WorkerPool {
                    message: format!("failed to start worker {index}: {e}"),
                })?;
            handles.push(handle);
        }

        Ok(Self {
            jobs: Some(job_tx),
            reports: report_rx,
            workers: handles,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn submit<F>(&self, key: K, task: F) -> PipelineResult<()>
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let sender = self.jobs.as_ref().ok_or_else(|| PipelineError::WorkerPool {
            message: "pool is shut down".to_string(),
        })?;
        sender
            .send(Job {
                key,
                task: Box::new(task),
            })
            .map_err(|_| PipelineError::WorkerPool {
                message: "all workers have exited".to_string(),
            })
    }

    /// Next finished job, in completion order. Blocks.
    pub fn recv(&self) -> PipelineResult<JobReport<K, R>> {
        self.reports.recv().map_err(|_| PipelineError::WorkerPool {
            message: "all workers have exited".to_string(),
        })
    }
}

impl<K, R> Drop for WorkerPool<K, R> {
    fn drop(&mut self) {
        // Closing the job channel lets every supervisor leave its loop.
        self.jobs.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn supervise<K, R>(
    index: usize,
    jobs: Arc<Mutex<Receiver<Job<K, R>>>>,
    reports: Sender<JobReport<K, R>>,
    timeout: Duration,
) where
    K: Clone + Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    loop {
        let job = {
            let Ok(queue) = jobs.lock() else {
                return;
            };
            match queue.recv() {
                Ok(job) => job,
                Err(_) => return,
            }
        };

        let started = Instant::now();
        let key = job.key.clone();
        let outcome = run_with_deadline(index, job, timeout);
        if matches!(outcome, JobOutcome::TimedOut) {
            warn!(worker = index, job = ?key, timeout_s = timeout.as_secs_f64(), "job timed out, abandoning it");
        }
        let report = JobReport {
            key,
            outcome,
            elapsed: started.elapsed(),
        };
        if reports.send(report).is_err() {
            debug!(worker = index, "report channel closed, stopping");
            return;
        }
    }
}

fn run_with_deadline<K, R>(index: usize, job: Job<K, R>, timeout: Duration) -> JobOutcome<R>
where
    K: std::fmt::Debug,
    R: Send + 'static,
{
    let (done_tx, done_rx) = mpsc::sync_channel(1);
    let task = job.task;
    let spawned = thread::Builder::new()
        .name(format!("sx-exec-{index}"))
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(task));
            let _ = done_tx.send(result);
        });
    if let Err(e) = spawned {
        return JobOutcome::Crashed(format!("failed to start job {:?}: {e}", job.key));
    }

    match done_rx.recv_timeout(timeout) {
        Ok(Ok(result)) => JobOutcome::Completed(result),
        Ok(Err(payload)) => JobOutcome::Crashed(panic_message(payload.as_ref())),
        Err(RecvTimeoutError::Timeout) => JobOutcome::TimedOut,
        Err(RecvTimeoutError::Disconnected) => {
            JobOutcome::Crashed("job exited without a result".to_string())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_every_job_once() {
        let pool: WorkerPool<u32, u32> =
            WorkerPool::new(3, Duration::from_secs(5)).expect("pool");
        for k in 0..10 {
            pool.submit(k, move || k * 2).expect("submit");
        }
        let mut doubled: Vec<u32> = (0..10)
            .map(|_| match pool.recv().expect("report").outcome {
                JobOutcome::Completed(v) => v,
                other => panic!("unexpected outcome {other:?}"),
            })
            .collect();
        doubled.sort_unstable();
        assert_eq!(doubled, (0..10).map(|k| k * 2).collect::<Vec<_>>());
    }

    #[test]
    fn slow_job_times_out_and_siblings_finish() {
        let pool: WorkerPool<&'static str, ()> =
            WorkerPool::new(1, Duration::from_millis(100)).expect("pool");
        pool.submit("slow", || thread::sleep(Duration::from_secs(3)))
            .expect("submit");
        pool.submit("fast", || ()).expect("submit");

        let first = pool.recv().expect("report");
        assert_eq!(first.key, "slow");
        assert_eq!(first.outcome, JobOutcome::TimedOut);
        let second = pool.recv().expect("report");
        assert_eq!(second.key, "fast");
        assert_eq!(second.outcome, JobOutcome::Completed(()));
    }

    #[test]
    fn panics_are_reported() {
        let pool: WorkerPool<u8, ()> = WorkerPool::new(1, Duration::from_secs(5)).expect("pool");
        pool.submit(1, || panic!("boom")).expect("submit");
        let report = pool.recv().expect("report");
        assert_eq!(report.outcome, JobOutcome::Crashed("panicked: boom".to_string()));
    }
}
