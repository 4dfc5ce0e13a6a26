//! Send-to-authority domain service: serialize, sign, transmit, reconcile.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use facturo_core::Clock;
use facturo_documents::{AuthorityAck, Document};

use crate::error::SyncError;
use crate::ports::{AuthorityGateway, DocumentSerializer, DocumentStore, Signer};

/// Response codes meaning the authority accepted the document.
pub const ACCEPTED_CODES: [&str; 2] = ["0260", "0422"];

pub fn is_accepted_code(code: &str) -> bool {
    ACCEPTED_CODES.contains(&code)
}

/// How the authority resolved a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    Rejected,
}

/// A completed exchange with the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub verdict: Verdict,
    pub code: String,
    pub message: String,
}

impl Delivery {
    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }
}

/// Pushes one document to the authority and records the answer.
///
/// Makes a single attempt. Any failure before the authority answers leaves the
/// document untouched and is returned to the caller; retrying is the caller's
/// business.
pub struct SendToAuthority {
    serializer: Arc<dyn DocumentSerializer>,
    signer: Arc<dyn Signer>,
    gateway: Arc<dyn AuthorityGateway>,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl SendToAuthority {
    pub fn new(
        serializer: Arc<dyn DocumentSerializer>,
        signer: Arc<dyn Signer>,
        gateway: Arc<dyn AuthorityGateway>,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            serializer,
            signer,
            gateway,
            store,
            clock,
        }
    }

    pub fn send(&self, document: &mut Document) -> Result<Delivery, SyncError> {
        if !document.status().is_pending() {
            return Err(SyncError::InconsistentState {
                document_id: document.id_typed(),
                status: document.status(),
            });
        }
        let control_code = document
            .control_code()
            .cloned()
            .ok_or(SyncError::ControlCodeMissing(document.id_typed()))?;

        let payload = self
            .serializer
            .serialize(document)
            .map_err(SyncError::transmission)?;
        let signed = self
            .signer
            .sign(document.merchant_id(), payload)
            .map_err(SyncError::transmission)?;
        let response = self.gateway.submit(&signed).map_err(SyncError::transmission)?;

        if response.control_code != control_code.as_str() {
            warn!(
                document_id = %document.id_typed(),
                control_code = %control_code,
                echoed = %response.control_code,
                "authority echoed a different control code"
            );
        }

        document.mark_submitted()?;
        let ack = AuthorityAck {
            code: response.code.clone(),
            message: response.message.clone(),
            received_at: self.clock.now(),
        };
        let verdict = if is_accepted_code(&response.code) {
            document.mark_accepted(ack)?;
            Verdict::Accepted
        } else {
            document.mark_rejected(ack)?;
            Verdict::Rejected
        };
        self.store.save(document)?;

        match verdict {
            Verdict::Accepted => info!(
                document_id = %document.id_typed(),
                merchant_id = %document.merchant_id(),
                control_code = %control_code,
                code = %response.code,
                "document accepted by authority"
            ),
            Verdict::Rejected => warn!(
                document_id = %document.id_typed(),
                merchant_id = %document.merchant_id(),
                control_code = %control_code,
                code = %response.code,
                message = %response.message,
                "document rejected by authority"
            ),
        }

        Ok(Delivery {
            verdict,
            code: response.code,
            message: response.message,
        })
    }
}
