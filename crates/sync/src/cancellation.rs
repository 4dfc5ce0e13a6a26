//! Authority events outside the delivery pipeline: document cancellation and
//! voiding of unused number ranges. Neither is ever retried automatically.

use std::sync::Arc;

use tracing::{info, warn};

use facturo_core::{Clock, DocumentId, DomainError};
use facturo_documents::{AuthorityAck, Document, DocumentStatus, NumberingAuthorization};

use crate::error::SyncError;
use crate::ports::{AuthorityGateway, AuthorityResponse, DocumentStore, NumberRangeVoid};

/// Response code confirming a cancellation or range-void event.
pub const EVENT_CONFIRMED_CODE: &str = "0600";

fn require_reason(reason: &str) -> Result<&str, SyncError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(DomainError::validation("a reason is required").into());
    }
    Ok(reason)
}

fn refused(response: AuthorityResponse) -> SyncError {
    SyncError::AuthorityRefused {
        code: response.code,
        message: response.message,
    }
}

/// Voids an accepted document once the authority confirms the cancellation.
pub struct CancelDocument {
    store: Arc<dyn DocumentStore>,
    gateway: Arc<dyn AuthorityGateway>,
    clock: Arc<dyn Clock>,
}

impl CancelDocument {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn AuthorityGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
        }
    }

    pub fn cancel(&self, document_id: DocumentId, reason: &str) -> Result<Document, SyncError> {
        let reason = require_reason(reason)?;
        let mut document = self
            .store
            .find_by_id(document_id)?
            .ok_or(SyncError::DocumentNotFound(document_id))?;

        if document.status() != DocumentStatus::Accepted {
            return Err(SyncError::InconsistentState {
                document_id,
                status: document.status(),
            });
        }
        let control_code = document
            .control_code()
            .cloned()
            .ok_or(SyncError::ControlCodeMissing(document_id))?;

        let response = self
            .gateway
            .cancel(&control_code, reason)
            .map_err(SyncError::transmission)?;
        if response.code != EVENT_CONFIRMED_CODE {
            warn!(
                document_id = %document_id,
                control_code = %control_code,
                code = %response.code,
                "authority refused cancellation"
            );
            return Err(refused(response));
        }

        document.void(
            reason,
            AuthorityAck {
                code: response.code,
                message: response.message,
                received_at: self.clock.now(),
            },
        )?;
        self.store.save(&document)?;
        info!(
            document_id = %document_id,
            merchant_id = %document.merchant_id(),
            control_code = %control_code,
            "document voided"
        );
        Ok(document)
    }
}

/// Tells the authority that a range of authorized numbers will never be used.
pub struct VoidNumberRange {
    gateway: Arc<dyn AuthorityGateway>,
}

impl VoidNumberRange {
    pub fn new(gateway: Arc<dyn AuthorityGateway>) -> Self {
        Self { gateway }
    }

    pub fn void(
        &self,
        authorization: &NumberingAuthorization,
        from: u32,
        to: u32,
        reason: &str,
    ) -> Result<AuthorityResponse, SyncError> {
        let reason = require_reason(reason)?;
        if from == 0 || from > to {
            return Err(DomainError::validation(format!("invalid number range {from}..={to}")).into());
        }
        if !authorization.contains_range(from, to) {
            return Err(DomainError::validation(format!(
                "range {from}..={to} is outside authorization {}",
                authorization.number()
            ))
            .into());
        }

        let request = NumberRangeVoid {
            authorization_number: authorization.number(),
            establishment: authorization.establishment(),
            point_of_sale: authorization.point_of_sale(),
            from,
            to,
            reason: reason.to_string(),
        };
        let response = self
            .gateway
            .void_number_range(&request)
            .map_err(SyncError::transmission)?;
        if response.code != EVENT_CONFIRMED_CODE {
            return Err(refused(response));
        }

        info!(
            authorization = request.authorization_number,
            establishment = request.establishment,
            point_of_sale = request.point_of_sale,
            from,
            to,
            "number range voided"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncErrorKind;
    use crate::test_support::{authorization, coded_document, FakeGateway, Harness};
    use facturo_core::MerchantId;

    fn cancel_use_case(h: &Harness) -> CancelDocument {
        CancelDocument::new(h.store.clone(), h.gateway.clone(), Arc::new(h.clock.clone()))
    }

    fn accepted_document(h: &Harness) -> Document {
        let mut doc = coded_document(MerchantId::new(), h.clock.now());
        h.service.send(&mut doc).unwrap();
        doc
    }

    #[test]
    fn confirmed_cancellation_voids_document() {
        let h = Harness::new(FakeGateway::accepting());
        let doc = accepted_document(&h);

        let voided = cancel_use_case(&h)
            .cancel(doc.id_typed(), "  wrong customer ")
            .unwrap();

        assert_eq!(voided.status(), DocumentStatus::Voided);
        assert_eq!(voided.void_reason(), Some("wrong customer"));
        assert_eq!(h.stored(&doc).status(), DocumentStatus::Voided);
        let cancelled = h.gateway.cancelled.lock().unwrap().clone();
        assert_eq!(
            cancelled,
            vec![(doc.control_code().unwrap().to_string(), "wrong customer".to_string())]
        );
    }

    #[test]
    fn refused_cancellation_keeps_document_accepted() {
        let h = Harness::new(FakeGateway::accepting());
        *h.gateway.cancel_code.lock().unwrap() = "0610".to_string();
        let doc = accepted_document(&h);

        let err = cancel_use_case(&h).cancel(doc.id_typed(), "duplicate").unwrap_err();

        assert!(matches!(err, SyncError::AuthorityRefused { ref code, .. } if code == "0610"));
        assert_eq!(h.stored(&doc).status(), DocumentStatus::Accepted);
    }

    #[test]
    fn only_accepted_documents_can_be_cancelled() {
        let h = Harness::new(FakeGateway::answering("0160"));
        let doc = accepted_document(&h);

        let err = cancel_use_case(&h).cancel(doc.id_typed(), "duplicate").unwrap_err();

        assert_eq!(err.kind(), SyncErrorKind::StateConflict);
        assert!(h.gateway.cancelled.lock().unwrap().is_empty());
    }

    #[test]
    fn cancellation_requires_reason() {
        let h = Harness::new(FakeGateway::accepting());
        let doc = accepted_document(&h);
        let err = cancel_use_case(&h).cancel(doc.id_typed(), "   ").unwrap_err();
        assert_eq!(err.kind(), SyncErrorKind::Validation);
    }

    #[test]
    fn gateway_outage_surfaces_as_transient() {
        let h = Harness::new(FakeGateway::accepting());
        let doc = accepted_document(&h);
        h.gateway.set_unavailable(true);

        let err = cancel_use_case(&h).cancel(doc.id_typed(), "duplicate").unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(h.stored(&doc).status(), DocumentStatus::Accepted);
    }

    #[test]
    fn voids_range_inside_authorization() {
        let h = Harness::new(FakeGateway::accepting());
        let auth = authorization();

        let response = VoidNumberRange::new(h.gateway.clone())
            .void(&auth, 100, 150, "damaged booklet")
            .unwrap();

        assert_eq!(response.code, EVENT_CONFIRMED_CODE);
        let sent = h.gateway.voided_ranges.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].authorization_number, auth.number());
        assert_eq!((sent[0].from, sent[0].to), (100, 150));
    }

    #[test]
    fn rejects_ranges_outside_authorization() {
        let h = Harness::new(FakeGateway::accepting());
        let auth = authorization();
        let use_case = VoidNumberRange::new(h.gateway.clone());

        assert!(use_case.void(&auth, 150, 100, "x").is_err());
        assert!(use_case.void(&auth, 0, 10, "x").is_err());
        assert!(use_case.void(&auth, 1, 10_000_000, "x").is_err());
        assert!(h.gateway.voided_ranges.lock().unwrap().is_empty());
    }
}
