//! Batch sweep: push every pending document of a merchant, oldest first.

use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use facturo_core::{Clock, DocumentId, MerchantId};
use facturo_documents::{ControlCode, DocumentStatus};

use crate::authority::{SendToAuthority, Verdict};
use crate::error::SyncError;
use crate::ports::DocumentStore;
use crate::rate_limit::DeliveryRateLimiter;

/// Per-document line of a sweep report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepItem {
    pub document_id: DocumentId,
    pub control_code: Option<ControlCode>,
    pub succeeded: bool,
    /// Status after the attempt.
    pub status: DocumentStatus,
    pub verdict: Option<Verdict>,
    pub error: Option<SyncError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<SweepItem>,
    /// Left untouched because the delivery rate limit was reached.
    pub deferred: Vec<DocumentId>,
}

/// Sweeps run single-threaded per merchant; different merchants may sweep
/// concurrently.
pub struct BatchSweep {
    store: Arc<dyn DocumentStore>,
    service: Arc<SendToAuthority>,
    limiter: Option<(Mutex<DeliveryRateLimiter>, Arc<dyn Clock>)>,
}

impl BatchSweep {
    pub fn new(store: Arc<dyn DocumentStore>, service: Arc<SendToAuthority>) -> Self {
        Self {
            store,
            service,
            limiter: None,
        }
    }

    /// Cap submissions; once the window is used up the rest of the sweep is
    /// deferred.
    pub fn with_rate_limiter(mut self, limiter: DeliveryRateLimiter, clock: Arc<dyn Clock>) -> Self {
        self.limiter = Some((Mutex::new(limiter), clock));
        self
    }

    fn acquire_delivery_slot(&self) -> bool {
        match &self.limiter {
            None => true,
            Some((limiter, clock)) => limiter
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .try_acquire(clock.now()),
        }
    }

    pub fn sync(&self, merchant_id: MerchantId) -> Result<SweepReport, SyncError> {
        let mut documents = self.store.find_pending(merchant_id)?;
        documents.sort_by_key(|d| d.emission_date());

        let mut report = SweepReport {
            total: documents.len(),
            ..SweepReport::default()
        };

        let mut documents = documents.into_iter();
        while let Some(mut document) = documents.next() {
            if !self.acquire_delivery_slot() {
                report.deferred.push(document.id_typed());
                report.deferred.extend(documents.by_ref().map(|d| d.id_typed()));
                warn!(
                    merchant_id = %merchant_id,
                    deferred = report.deferred.len(),
                    "delivery rate limit reached; remaining documents deferred"
                );
                break;
            }

            let item = match self.service.send(&mut document) {
                Ok(delivery) => {
                    report.succeeded += 1;
                    SweepItem {
                        document_id: document.id_typed(),
                        control_code: document.control_code().cloned(),
                        succeeded: true,
                        status: document.status(),
                        verdict: Some(delivery.verdict),
                        error: None,
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        merchant_id = %merchant_id,
                        document_id = %document.id_typed(),
                        control_code = ?document.control_code().map(ControlCode::as_str),
                        error = %err,
                        "sweep delivery failed"
                    );
                    if let Err(save_err) = self.store.save(&document) {
                        error!(
                            document_id = %document.id_typed(),
                            error = %save_err,
                            "failed to persist document after sweep failure"
                        );
                    }
                    SweepItem {
                        document_id: document.id_typed(),
                        control_code: document.control_code().cloned(),
                        succeeded: false,
                        status: document.status(),
                        verdict: None,
                        error: Some(err),
                    }
                }
            };
            report.results.push(item);
        }

        info!(
            merchant_id = %merchant_id,
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            deferred = report.deferred.len(),
            "sweep finished"
        );
        Ok(report)
    }
}
