//! Sync job value object and retry policy.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use facturo_core::{DocumentId, MerchantId};
use facturo_documents::ControlCode;

/// Attempts allowed for a freshly enqueued document.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Unique sync job identifier. Stable across retries of the same document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncJobId(pub Uuid);

impl SyncJobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SyncJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One pending delivery of a document to the authority.
///
/// Immutable: a failed attempt produces a new job via [`SyncJob::with_error`].
/// `attempt_count <= max_attempts` is enforced by the retry path, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    id: SyncJobId,
    merchant_id: MerchantId,
    document_id: DocumentId,
    control_code: ControlCode,
    document_emission_date: DateTime<Utc>,
    attempt_count: u32,
    max_attempts: u32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
}

impl SyncJob {
    pub fn new(
        merchant_id: MerchantId,
        document_id: DocumentId,
        control_code: ControlCode,
        document_emission_date: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SyncJobId::new(),
            merchant_id,
            document_id,
            control_code,
            document_emission_date,
            attempt_count: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            last_error: None,
            created_at,
        }
    }

    /// Override the attempt budget (values below 1 are raised to 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// The job that replaces this one after a failed attempt.
    pub fn with_error(&self, error: impl Into<String>) -> Self {
        Self {
            attempt_count: self.attempt_count + 1,
            last_error: Some(error.into()),
            ..self.clone()
        }
    }

    pub fn id(&self) -> SyncJobId {
        self.id
    }

    pub fn merchant_id(&self) -> MerchantId {
        self.merchant_id
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn control_code(&self) -> &ControlCode {
        &self.control_code
    }

    pub fn document_emission_date(&self) -> DateTime<Utc> {
        self.document_emission_date
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// More failed attempts may still be retried.
    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_attempts
    }
}

/// Delivery timing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempt budget given to new jobs.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each further attempt.
    pub base_delay: Duration,
    /// How long after emission the authority still accepts a document.
    pub freshness_window: TimeDelta,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(1000),
            freshness_window: TimeDelta::hours(72),
        }
    }
}

/// Whole milliseconds in `delay`, clamped to `u64::MAX`.
pub(crate) fn saturating_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (1-indexed): `base * 2^(attempt - 1)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        self.base_delay.saturating_mul(factor)
    }

    /// The document left the authority's acceptance window.
    pub fn is_expired(&self, job: &SyncJob, now: DateTime<Utc>) -> bool {
        now - job.document_emission_date() > self.freshness_window
    }
}
