//! Sync queue contract and in-memory implementation.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use facturo_core::{Clock, MerchantId};

use crate::job::{saturating_millis, RetryPolicy, SyncJob, SyncJobId};
use crate::rate_limit::DeliveryRateLimiter;

/// Ordered holding area for jobs that still need to reach the authority.
///
/// Implementations must deliver in enqueue order to a single consumer and
/// must hide a dequeued job until it is completed or failed.
pub trait SyncQueue: Send + Sync {
    /// Add a new job, visible immediately.
    fn enqueue(&self, job: SyncJob) -> Result<(), QueueError>;

    /// Take the oldest visible job, if any.
    fn dequeue(&self) -> Result<Option<SyncJob>, QueueError>;

    /// Remove a job for good. Unknown or already completed ids are a no-op.
    fn complete(&self, job_id: SyncJobId) -> Result<(), QueueError>;

    /// Replace `job` with its next attempt and delay it by the backoff for that
    /// attempt, or drop it when its attempts are exhausted.
    fn fail(&self, job: &SyncJob, error: &str) -> Result<(), QueueError>;

    /// Backoff, attempt budget and freshness window applied to this queue's jobs.
    fn retry_policy(&self) -> RetryPolicy;

    /// Jobs not yet completed for a merchant, in delivery order.
    fn list_pending(&self, merchant_id: MerchantId) -> Result<Vec<SyncJob>, QueueError>;

    fn count_pending(&self, merchant_id: MerchantId) -> Result<usize, QueueError> {
        Ok(self.list_pending(merchant_id)?.len())
    }
}

/// Queue error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("job already queued: {0}")]
    AlreadyQueued(SyncJobId),
    #[error("queue storage error: {0}")]
    Storage(String),
}

/// Queue statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub in_flight: usize,
    pub delayed: usize,
    pub completed: u64,
    pub dropped: u64,
}

#[derive(Debug)]
struct Entry {
    job: SyncJob,
    visible_at: DateTime<Utc>,
    in_flight: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    // Kept in enqueue order; retries are appended at the back.
    entries: Vec<Entry>,
    completed: u64,
    dropped: u64,
}

/// In-memory queue for tests/dev.
///
/// Delayed retries become visible once the clock passes their backoff, and an
/// optional rate limiter caps how many jobs `dequeue` hands out per window.
pub struct InMemorySyncQueue {
    state: Mutex<QueueState>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    limiter: Option<Mutex<DeliveryRateLimiter>>,
}

impl InMemorySyncQueue {
    pub fn new(clock: Arc<dyn Clock>, policy: RetryPolicy) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            clock,
            policy,
            limiter: None,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: DeliveryRateLimiter) -> Self {
        self.limiter = Some(Mutex::new(limiter));
        self
    }

    pub fn stats(&self) -> Result<QueueStats, QueueError> {
        let state = self.state()?;
        let now = self.clock.now();
        let mut stats = QueueStats {
            completed: state.completed,
            dropped: state.dropped,
            ..QueueStats::default()
        };
        for entry in &state.entries {
            stats.pending += 1;
            if entry.in_flight {
                stats.in_flight += 1;
            } else if entry.visible_at > now {
                stats.delayed += 1;
            }
        }
        Ok(stats)
    }

    fn state(&self) -> Result<MutexGuard<'_, QueueState>, QueueError> {
        self.state
            .lock()
            .map_err(|_| QueueError::Storage("queue lock poisoned".to_string()))
    }

    fn acquire_delivery_slot(&self, now: DateTime<Utc>) -> Result<bool, QueueError> {
        match &self.limiter {
            None => Ok(true),
            Some(limiter) => {
                let mut limiter = limiter
                    .lock()
                    .map_err(|_| QueueError::Storage("rate limiter lock poisoned".to_string()))?;
                Ok(limiter.try_acquire(now))
            }
        }
    }
}

impl SyncQueue for InMemorySyncQueue {
    fn enqueue(&self, job: SyncJob) -> Result<(), QueueError> {
        let mut state = self.state()?;
        if state.entries.iter().any(|e| e.job.id() == job.id()) {
            return Err(QueueError::AlreadyQueued(job.id()));
        }
        debug!(job_id = %job.id(), document_id = %job.document_id(), "job enqueued");
        state.entries.push(Entry {
            job,
            visible_at: self.clock.now(),
            in_flight: false,
        });
        Ok(())
    }

    fn dequeue(&self) -> Result<Option<SyncJob>, QueueError> {
        let mut state = self.state()?;
        let now = self.clock.now();

        let Some(entry) = state
            .entries
            .iter_mut()
            .find(|e| !e.in_flight && e.visible_at <= now)
        else {
            return Ok(None);
        };

        if !self.acquire_delivery_slot(now)? {
            debug!(job_id = %entry.job.id(), "delivery rate limit reached; holding job");
            return Ok(None);
        }

        entry.in_flight = true;
        Ok(Some(entry.job.clone()))
    }

    fn complete(&self, job_id: SyncJobId) -> Result<(), QueueError> {
        let mut state = self.state()?;
        let before = state.entries.len();
        state.entries.retain(|e| e.job.id() != job_id);
        if state.entries.len() < before {
            state.completed += 1;
            debug!(job_id = %job_id, "job completed");
        }
        Ok(())
    }

    fn fail(&self, job: &SyncJob, error: &str) -> Result<(), QueueError> {
        let mut state = self.state()?;
        state.entries.retain(|e| e.job.id() != job.id());

        if !job.can_retry() {
            state.dropped += 1;
            warn!(
                job_id = %job.id(),
                merchant_id = %job.merchant_id(),
                control_code = %job.control_code(),
                attempt = job.attempt_count(),
                error,
                "attempts exhausted; job dropped"
            );
            return Ok(());
        }

        let next = job.with_error(error);
        let delay = self.policy.delay_for_attempt(next.attempt_count());
        let now = self.clock.now();
        let visible_at = TimeDelta::from_std(delay)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        debug!(
            job_id = %next.id(),
            attempt = next.attempt_count(),
            delay_ms = saturating_millis(delay),
            "job re-enqueued with backoff"
        );
        state.entries.push(Entry {
            job: next,
            visible_at,
            in_flight: false,
        });
        Ok(())
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    fn list_pending(&self, merchant_id: MerchantId) -> Result<Vec<SyncJob>, QueueError> {
        let state = self.state()?;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.job.merchant_id() == merchant_id)
            .map(|e| e.job.clone())
            .collect())
    }
}
