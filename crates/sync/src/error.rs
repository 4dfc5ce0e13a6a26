//! Sync-layer error model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use facturo_core::{DocumentId, DomainError};
use facturo_documents::DocumentStatus;

use crate::job::SyncJobId;
use crate::ports::StoreError;
use crate::queue::QueueError;

/// Coarse classification used at the boundary to decide what happens next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// Malformed input; rejected synchronously, never queued.
    Validation,
    /// The document is not in a state that allows the operation.
    StateConflict,
    /// Network/authority/storage trouble; worth retrying.
    Transient,
    /// The document left the authority's acceptance window.
    Expired,
    /// Attempts ran out without a definitive answer.
    Exhausted,
}

/// Error returned by sync use cases.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("document {0} has no control code")]
    ControlCodeMissing(DocumentId),

    #[error("document {document_id} is {status}")]
    InconsistentState {
        document_id: DocumentId,
        status: DocumentStatus,
    },

    #[error("document {document_id} is already queued as job {job_id}")]
    AlreadyQueued {
        document_id: DocumentId,
        job_id: SyncJobId,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Serialization, signing or transport failure.
    #[error("transmission failed: {0}")]
    Transmission(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("document {document_id} emitted at {emitted_at} is past the freshness window")]
    Expired {
        document_id: DocumentId,
        emitted_at: DateTime<Utc>,
    },

    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    /// The authority answered, but not with the confirmation code.
    #[error("authority refused ({code}): {message}")]
    AuthorityRefused { code: String, message: String },
}

impl SyncError {
    /// Wrap an opaque collaborator failure (serializer, signer, gateway).
    pub fn transmission(err: anyhow::Error) -> Self {
        Self::Transmission(format!("{err:#}"))
    }

    pub fn kind(&self) -> SyncErrorKind {
        match self {
            SyncError::DocumentNotFound(_) => SyncErrorKind::Validation,
            SyncError::Domain(DomainError::InvalidStateTransition { .. })
            | SyncError::Domain(DomainError::Conflict(_))
            | SyncError::Domain(DomainError::InvariantViolation(_)) => SyncErrorKind::StateConflict,
            SyncError::Domain(_) => SyncErrorKind::Validation,
            SyncError::ControlCodeMissing(_)
            | SyncError::InconsistentState { .. }
            | SyncError::AlreadyQueued { .. }
            | SyncError::AuthorityRefused { .. } => SyncErrorKind::StateConflict,
            SyncError::Transmission(_) | SyncError::Store(_) | SyncError::Queue(_) => {
                SyncErrorKind::Transient
            }
            SyncError::Expired { .. } => SyncErrorKind::Expired,
            SyncError::Exhausted { .. } => SyncErrorKind::Exhausted,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == SyncErrorKind::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify_errors() {
        let id = DocumentId::new();
        assert_eq!(SyncError::DocumentNotFound(id).kind(), SyncErrorKind::Validation);
        assert_eq!(SyncError::ControlCodeMissing(id).kind(), SyncErrorKind::StateConflict);
        assert_eq!(
            SyncError::Domain(DomainError::invalid_control_code("bad")).kind(),
            SyncErrorKind::Validation
        );
        assert_eq!(
            SyncError::Domain(DomainError::invalid_transition("created", "accepted")).kind(),
            SyncErrorKind::StateConflict
        );
        assert_eq!(
            SyncError::AlreadyQueued { document_id: id, job_id: SyncJobId::new() }.kind(),
            SyncErrorKind::StateConflict
        );
        assert!(SyncError::Transmission("timeout".into()).is_retryable());
        assert!(!SyncError::Exhausted { attempts: 5, last_error: "x".into() }.is_retryable());
        assert_eq!(
            SyncError::Expired { document_id: id, emitted_at: Utc::now() }.kind(),
            SyncErrorKind::Expired
        );
    }

    #[test]
    fn transmission_keeps_error_chain() {
        let err = anyhow::anyhow!("connection reset").context("submit failed");
        let sync = SyncError::transmission(err);
        assert_eq!(sync.to_string(), "transmission failed: submit failed: connection reset");
    }
}
