//! Background delivery worker: the queue's single consumer.

use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::processor::{ProcessOutcome, ProcessResult, SyncJobProcessor};

/// Worker runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_retried: u64,
    pub jobs_expired: u64,
    pub jobs_exhausted: u64,
    pub uptime_secs: u64,
}

impl WorkerStats {
    fn record(&mut self, result: &ProcessResult) {
        self.jobs_processed += 1;
        if result.succeeded {
            self.jobs_succeeded += 1;
        } else {
            self.jobs_failed += 1;
        }
        match result.outcome {
            ProcessOutcome::RetryScheduled { .. } => self.jobs_retried += 1,
            ProcessOutcome::Expired => self.jobs_expired += 1,
            ProcessOutcome::Exhausted { .. } => self.jobs_exhausted += 1,
            _ => {}
        }
    }
}

fn lock_stats(stats: &Mutex<WorkerStats>) -> MutexGuard<'_, WorkerStats> {
    stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle to control a running worker. Dropping it also stops the worker.
#[derive(Debug)]
pub struct SyncWorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl SyncWorkerHandle {
    /// Request graceful shutdown and wait for the in-flight job to finish.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }

    pub fn stats(&self) -> WorkerStats {
        lock_stats(&self.stats).clone()
    }
}

/// Pulls jobs off the queue one at a time and hands them to the processor.
pub struct SyncWorker {
    processor: SyncJobProcessor,
}

impl SyncWorker {
    pub fn new(processor: SyncJobProcessor) -> Self {
        Self { processor }
    }

    /// Process the next visible job, if any.
    pub fn run_once(&self) -> Result<Option<ProcessResult>, SyncError> {
        let Some(job) = self.processor.queue().dequeue()? else {
            return Ok(None);
        };
        debug!(
            job_id = %job.id(),
            merchant_id = %job.merchant_id(),
            attempt = job.attempt_count(),
            "claimed job"
        );
        self.processor.process(&job).map(Some)
    }

    /// Process everything currently visible and return the results.
    pub fn drain(&self) -> Result<Vec<ProcessResult>, SyncError> {
        let mut results = Vec::new();
        while let Some(result) = self.run_once()? {
            results.push(result);
        }
        Ok(results)
    }

    /// Run the worker on its own thread until the handle shuts it down.
    pub fn spawn(self, config: &SyncConfig) -> std::io::Result<SyncWorkerHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(WorkerStats::default()));
        let loop_stats = stats.clone();
        let name = config.worker_name.clone();
        let poll_interval = config.poll_interval;

        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(self, &name, poll_interval, shutdown_rx, loop_stats))?;

        Ok(SyncWorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }
}

/// Sleep for `interval` unless shutdown arrives first. Returns true on shutdown.
fn idle(shutdown_rx: &mpsc::Receiver<()>, interval: Duration) -> bool {
    !matches!(shutdown_rx.recv_timeout(interval), Err(RecvTimeoutError::Timeout))
}

fn worker_loop(
    worker: SyncWorker,
    name: &str,
    poll_interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<WorkerStats>>,
) {
    info!(worker = %name, "sync worker started");
    let started = Instant::now();

    loop {
        match shutdown_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        lock_stats(&stats).uptime_secs = started.elapsed().as_secs();

        match worker.run_once() {
            Ok(Some(result)) => {
                lock_stats(&stats).record(&result);
                debug!(
                    worker = %name,
                    job_id = %result.job_id,
                    succeeded = result.succeeded,
                    outcome = result.outcome.reason(),
                    "job processed"
                );
            }
            Ok(None) => {
                if idle(&shutdown_rx, poll_interval) {
                    break;
                }
            }
            Err(err) => {
                error!(worker = %name, error = %err, "queue unavailable");
                if idle(&shutdown_rx, poll_interval) {
                    break;
                }
            }
        }
    }

    info!(worker = %name, "sync worker stopped");
}
