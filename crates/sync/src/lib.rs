//! Delivery pipeline between locally issued documents and the tax authority.
//!
//! ## Design
//!
//! - At-least-once delivery: a job is completed only after the authority answered
//! - Single consumer per queue, FIFO by enqueue order
//! - Exponential backoff between attempts, bounded by an attempt budget
//! - Documents older than the freshness window are abandoned, never sent
//!
//! ## Components
//!
//! - `SyncJob` / `RetryPolicy`: one pending delivery and its timing rules
//! - `SyncQueue`: ordered holding area (in-memory implementation included)
//! - `EnqueueDocument`: turns a coded document into its first job
//! - `SendToAuthority`: serialize, sign, transmit, reconcile
//! - `SyncJobProcessor` / `SyncWorker`: consume jobs one at a time
//! - `BatchSweep`: push every pending document of a merchant in one pass
//! - `CancelDocument`, `VoidNumberRange`, `LookupTaxpayer`: other authority calls

pub mod authority;
pub mod cancellation;
pub mod config;
pub mod enqueue;
pub mod error;
pub mod job;
pub mod ports;
pub mod processor;
pub mod queue;
pub mod rate_limit;
pub mod sweep;
pub mod taxpayer;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use authority::{is_accepted_code, Delivery, SendToAuthority, Verdict, ACCEPTED_CODES};
pub use cancellation::{CancelDocument, VoidNumberRange, EVENT_CONFIRMED_CODE};
pub use config::{ConfigError, SyncConfig};
pub use enqueue::{EnqueueDocument, EnqueueReceipt};
pub use error::{SyncError, SyncErrorKind};
pub use job::{RetryPolicy, SyncJob, SyncJobId, DEFAULT_MAX_ATTEMPTS};
pub use ports::{
    AuthorityGateway, AuthorityResponse, DocumentPayload, DocumentSerializer, DocumentStore,
    InMemoryDocumentStore, JsonDocumentSerializer, NumberRangeVoid, SignedPayload, Signer,
    StoreError, SubmissionResponse, TaxpayerRecord,
};
pub use processor::{ProcessOutcome, ProcessResult, SyncJobProcessor};
pub use queue::{InMemorySyncQueue, QueueError, QueueStats, SyncQueue};
pub use rate_limit::DeliveryRateLimiter;
pub use sweep::{BatchSweep, SweepItem, SweepReport};
pub use taxpayer::LookupTaxpayer;
pub use worker::{SyncWorker, SyncWorkerHandle, WorkerStats};
