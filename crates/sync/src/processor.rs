//! Single-job processor: expiry, idempotency, delivery, retry bookkeeping.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use facturo_core::{Clock, DocumentId};
use facturo_documents::{ControlCode, DocumentStatus};

use crate::authority::{SendToAuthority, Verdict};
use crate::error::SyncError;
use crate::job::{saturating_millis, SyncJob, SyncJobId};
use crate::ports::DocumentStore;
use crate::queue::SyncQueue;

/// Why a job left (or went back to) the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    Accepted,
    Rejected { code: String, message: String },
    /// The document was already resolved; nothing was sent.
    AlreadyResolved { status: DocumentStatus },
    /// Failed again; the queue will retry after `delay`.
    RetryScheduled { attempt: u32, delay: Duration },
    Expired,
    DocumentNotFound,
    Exhausted { attempts: u32 },
}

impl ProcessOutcome {
    pub fn reason(&self) -> &'static str {
        match self {
            ProcessOutcome::Accepted => "accepted",
            ProcessOutcome::Rejected { .. } => "rejected",
            ProcessOutcome::AlreadyResolved { .. } => "already resolved",
            ProcessOutcome::RetryScheduled { .. } => "retry scheduled",
            ProcessOutcome::Expired => "expired",
            ProcessOutcome::DocumentNotFound => "document not found",
            ProcessOutcome::Exhausted { .. } => "max attempts exceeded",
        }
    }
}

/// Result of processing one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// The authority gave a definitive answer, now or earlier.
    pub succeeded: bool,
    pub job_id: SyncJobId,
    pub document_id: DocumentId,
    pub control_code: ControlCode,
    pub outcome: ProcessOutcome,
    pub error: Option<SyncError>,
}

impl ProcessResult {
    fn success(job: &SyncJob, outcome: ProcessOutcome) -> Self {
        Self {
            succeeded: true,
            job_id: job.id(),
            document_id: job.document_id(),
            control_code: job.control_code().clone(),
            outcome,
            error: None,
        }
    }

    fn failure(job: &SyncJob, outcome: ProcessOutcome, error: SyncError) -> Self {
        Self {
            succeeded: false,
            job_id: job.id(),
            document_id: job.document_id(),
            control_code: job.control_code().clone(),
            outcome,
            error: Some(error),
        }
    }
}

/// Consumes one job at a time on behalf of the queue's single consumer.
///
/// `Err` is returned only when the queue itself cannot be updated; every
/// delivery problem is reported through [`ProcessResult`]. Expiry and backoff
/// follow the queue's [`RetryPolicy`](crate::job::RetryPolicy).
pub struct SyncJobProcessor {
    queue: Arc<dyn SyncQueue>,
    store: Arc<dyn DocumentStore>,
    service: Arc<SendToAuthority>,
    clock: Arc<dyn Clock>,
}

impl SyncJobProcessor {
    pub fn new(
        queue: Arc<dyn SyncQueue>,
        store: Arc<dyn DocumentStore>,
        service: Arc<SendToAuthority>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            queue,
            store,
            service,
            clock,
        }
    }

    pub fn queue(&self) -> &Arc<dyn SyncQueue> {
        &self.queue
    }

    pub fn process(&self, job: &SyncJob) -> Result<ProcessResult, SyncError> {
        if self.queue.retry_policy().is_expired(job, self.clock.now()) {
            self.queue.complete(job.id())?;
            warn!(
                job_id = %job.id(),
                merchant_id = %job.merchant_id(),
                control_code = %job.control_code(),
                attempt = job.attempt_count(),
                emitted_at = %job.document_emission_date(),
                "document past freshness window; job dropped"
            );
            return Ok(ProcessResult::failure(
                job,
                ProcessOutcome::Expired,
                SyncError::Expired {
                    document_id: job.document_id(),
                    emitted_at: job.document_emission_date(),
                },
            ));
        }

        let mut document = match self.store.find_by_id(job.document_id()) {
            Ok(Some(document)) => document,
            Ok(None) => {
                self.queue.complete(job.id())?;
                warn!(
                    job_id = %job.id(),
                    merchant_id = %job.merchant_id(),
                    document_id = %job.document_id(),
                    control_code = %job.control_code(),
                    attempt = job.attempt_count(),
                    "document not found; job dropped"
                );
                return Ok(ProcessResult::failure(
                    job,
                    ProcessOutcome::DocumentNotFound,
                    SyncError::DocumentNotFound(job.document_id()),
                ));
            }
            Err(err) => {
                error!(job_id = %job.id(), error = %err, "failed to load document");
                return self.retry_or_give_up(job, err.into());
            }
        };

        if document.status().is_resolved() {
            self.queue.complete(job.id())?;
            debug!(
                job_id = %job.id(),
                document_id = %job.document_id(),
                status = %document.status(),
                "document already resolved; nothing to send"
            );
            return Ok(ProcessResult::success(
                job,
                ProcessOutcome::AlreadyResolved {
                    status: document.status(),
                },
            ));
        }

        match self.service.send(&mut document) {
            Ok(delivery) => {
                self.queue.complete(job.id())?;
                let outcome = match delivery.verdict {
                    Verdict::Accepted => ProcessOutcome::Accepted,
                    Verdict::Rejected => ProcessOutcome::Rejected {
                        code: delivery.code,
                        message: delivery.message,
                    },
                };
                info!(
                    job_id = %job.id(),
                    merchant_id = %job.merchant_id(),
                    control_code = %job.control_code(),
                    attempt = job.attempt_count(),
                    outcome = outcome.reason(),
                    "job delivered"
                );
                Ok(ProcessResult::success(job, outcome))
            }
            Err(err) => self.retry_or_give_up(job, err),
        }
    }

    fn retry_or_give_up(&self, job: &SyncJob, err: SyncError) -> Result<ProcessResult, SyncError> {
        let message = err.to_string();

        if job.can_retry() {
            self.queue.fail(job, &message)?;
            let attempt = job.attempt_count() + 1;
            let delay = self.queue.retry_policy().delay_for_attempt(attempt);
            warn!(
                job_id = %job.id(),
                merchant_id = %job.merchant_id(),
                control_code = %job.control_code(),
                attempt,
                delay_ms = saturating_millis(delay),
                error = %message,
                "delivery failed; retry scheduled"
            );
            return Ok(ProcessResult::failure(
                job,
                ProcessOutcome::RetryScheduled { attempt, delay },
                err,
            ));
        }

        self.queue.complete(job.id())?;
        error!(
            job_id = %job.id(),
            merchant_id = %job.merchant_id(),
            control_code = %job.control_code(),
            attempt = job.attempt_count(),
            last_error = %message,
            "max attempts exceeded; job abandoned"
        );
        Ok(ProcessResult::failure(
            job,
            ProcessOutcome::Exhausted {
                attempts: job.attempt_count(),
            },
            SyncError::Exhausted {
                attempts: job.attempt_count(),
                last_error: message,
            },
        ))
    }
}
