//! Enqueue use case: turn a coded document into its first sync job.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use facturo_core::{Clock, DocumentId};
use facturo_documents::{ControlCode, DocumentStatus};

use crate::error::SyncError;
use crate::job::{SyncJob, SyncJobId};
use crate::ports::DocumentStore;
use crate::queue::SyncQueue;

/// What the caller gets back once a document is queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnqueueReceipt {
    pub job_id: SyncJobId,
    pub control_code: ControlCode,
}

pub struct EnqueueDocument {
    store: Arc<dyn DocumentStore>,
    queue: Arc<dyn SyncQueue>,
    clock: Arc<dyn Clock>,
}

impl EnqueueDocument {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        queue: Arc<dyn SyncQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            queue,
            clock,
        }
    }

    /// Queue a freshly coded document for delivery.
    ///
    /// Only `Created` documents with a control code and no job already in the
    /// queue are eligible. The job's attempt budget is the queue's.
    pub fn enqueue(&self, document_id: DocumentId) -> Result<EnqueueReceipt, SyncError> {
        let document = self
            .store
            .find_by_id(document_id)?
            .ok_or(SyncError::DocumentNotFound(document_id))?;

        let control_code = document
            .control_code()
            .cloned()
            .ok_or(SyncError::ControlCodeMissing(document_id))?;

        if document.status() != DocumentStatus::Created {
            return Err(SyncError::InconsistentState {
                document_id,
                status: document.status(),
            });
        }

        if let Some(queued) = self
            .queue
            .list_pending(document.merchant_id())?
            .into_iter()
            .find(|job| job.document_id() == document_id)
        {
            return Err(SyncError::AlreadyQueued {
                document_id,
                job_id: queued.id(),
            });
        }

        let job = SyncJob::new(
            document.merchant_id(),
            document_id,
            control_code.clone(),
            document.emission_date(),
            self.clock.now(),
        )
        .with_max_attempts(self.queue.retry_policy().max_attempts);
        let job_id = job.id();

        self.queue.enqueue(job)?;
        info!(
            job_id = %job_id,
            merchant_id = %document.merchant_id(),
            document_id = %document_id,
            control_code = %control_code,
            "document queued for delivery"
        );

        Ok(EnqueueReceipt {
            job_id,
            control_code,
        })
    }
}
