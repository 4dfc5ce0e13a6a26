//! Shared fixtures and fakes for unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use facturo_core::{ClientId, DocumentId, ManualClock, MerchantId};
use facturo_documents::{
    ControlCode, Document, DocumentDraft, DocumentNumber, DocumentType, EmissionMode, Issuer,
    LineItem, NumberingAuthorization, PaymentTerms, TaxId, TaxRate, TaxpayerKind,
};

use crate::authority::SendToAuthority;
use crate::job::SyncJob;
use crate::ports::{
    AuthorityGateway, AuthorityResponse, DocumentPayload, DocumentStore, InMemoryDocumentStore,
    JsonDocumentSerializer, NumberRangeVoid, SignedPayload, Signer, SubmissionResponse,
    TaxpayerRecord,
};

static SEQUENCE: AtomicU32 = AtomicU32::new(1);

pub(crate) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

pub(crate) fn fixed_clock() -> ManualClock {
    ManualClock::new(start_time())
}

pub(crate) fn authorization() -> NumberingAuthorization {
    NumberingAuthorization::new(
        12_345_678,
        1,
        1,
        (1, 9_999_999),
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        None,
    )
    .unwrap()
}

pub(crate) fn issuer(merchant_id: MerchantId) -> Issuer {
    Issuer {
        merchant_id,
        tax_id: "80069563-1".parse::<TaxId>().unwrap(),
        taxpayer_kind: TaxpayerKind::Company,
    }
}

pub(crate) fn draft_document(merchant_id: MerchantId, emitted: DateTime<Utc>) -> Document {
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    Document::create(DocumentDraft {
        id: DocumentId::new(),
        merchant_id,
        client_id: ClientId::new(),
        document_type: DocumentType::Invoice,
        authorization: authorization(),
        number: DocumentNumber::new(1, 1, sequence).unwrap(),
        emission_mode: EmissionMode::Normal,
        payment_terms: PaymentTerms::Cash,
        emission_date: emitted,
        items: vec![LineItem::new("coffee", 2, 11_000, TaxRate::Ten).unwrap()],
    })
    .unwrap()
}

pub(crate) fn coded_document(merchant_id: MerchantId, emitted: DateTime<Utc>) -> Document {
    let mut doc = draft_document(merchant_id, emitted);
    doc.generate_control_code(&issuer(merchant_id), None).unwrap();
    doc
}

pub(crate) fn sample_code() -> ControlCode {
    coded_document(MerchantId::new(), start_time())
        .control_code()
        .cloned()
        .unwrap()
}

pub(crate) fn sample_job(merchant_id: MerchantId, emitted: DateTime<Utc>) -> SyncJob {
    SyncJob::new(merchant_id, DocumentId::new(), sample_code(), emitted, emitted)
}

pub(crate) fn job_for(document: &Document, created_at: DateTime<Utc>) -> SyncJob {
    SyncJob::new(
        document.merchant_id(),
        document.id_typed(),
        document.control_code().cloned().unwrap(),
        document.emission_date(),
        created_at,
    )
}

/// Signs with a fixed marker.
pub(crate) struct FakeSigner;

impl Signer for FakeSigner {
    fn sign(&self, merchant_id: MerchantId, payload: DocumentPayload) -> anyhow::Result<SignedPayload> {
        Ok(SignedPayload {
            payload,
            signature: format!("signed-by-{merchant_id}"),
        })
    }
}

/// Scripted authority.
pub(crate) struct FakeGateway {
    pub submit_code: Mutex<String>,
    pub cancel_code: Mutex<String>,
    pub unavailable: Mutex<bool>,
    pub failing: Mutex<HashSet<String>>,
    pub submitted: Mutex<Vec<String>>,
    pub cancelled: Mutex<Vec<(String, String)>>,
    pub voided_ranges: Mutex<Vec<NumberRangeVoid>>,
}

impl FakeGateway {
    pub(crate) fn accepting() -> Self {
        Self::answering("0260")
    }

    pub(crate) fn answering(code: &str) -> Self {
        Self {
            submit_code: Mutex::new(code.to_string()),
            cancel_code: Mutex::new("0600".to_string()),
            unavailable: Mutex::new(false),
            failing: Mutex::new(HashSet::new()),
            submitted: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            voided_ranges: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    pub(crate) fn fail_for(&self, control_code: &ControlCode) {
        self.failing.lock().unwrap().insert(control_code.to_string());
    }

    pub(crate) fn submissions(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

impl AuthorityGateway for FakeGateway {
    fn submit(&self, payload: &SignedPayload) -> anyhow::Result<SubmissionResponse> {
        let code = payload.payload.control_code.to_string();
        if *self.unavailable.lock().unwrap() || self.failing.lock().unwrap().contains(&code) {
            anyhow::bail!("authority unavailable");
        }
        self.submitted.lock().unwrap().push(code.clone());
        Ok(SubmissionResponse {
            code: self.submit_code.lock().unwrap().clone(),
            message: "processed".to_string(),
            control_code: code,
        })
    }

    fn cancel(&self, control_code: &ControlCode, reason: &str) -> anyhow::Result<AuthorityResponse> {
        if *self.unavailable.lock().unwrap() {
            anyhow::bail!("authority unavailable");
        }
        self.cancelled
            .lock()
            .unwrap()
            .push((control_code.to_string(), reason.to_string()));
        Ok(AuthorityResponse {
            code: self.cancel_code.lock().unwrap().clone(),
            message: "event registered".to_string(),
        })
    }

    fn void_number_range(&self, request: &NumberRangeVoid) -> anyhow::Result<AuthorityResponse> {
        self.voided_ranges.lock().unwrap().push(request.clone());
        Ok(AuthorityResponse {
            code: self.cancel_code.lock().unwrap().clone(),
            message: "range voided".to_string(),
        })
    }

    fn lookup_tax_id(&self, tax_id: &TaxId) -> anyhow::Result<TaxpayerRecord> {
        let found = tax_id.number() == "80069563";
        Ok(TaxpayerRecord {
            found,
            legal_name: found.then(|| "Comercial Guarani SA".to_string()),
        })
    }
}

/// Wiring shared by service/processor/sweep tests.
pub(crate) struct Harness {
    pub clock: ManualClock,
    pub store: Arc<InMemoryDocumentStore>,
    pub gateway: Arc<FakeGateway>,
    pub service: Arc<SendToAuthority>,
}

impl Harness {
    pub(crate) fn new(gateway: FakeGateway) -> Self {
        let clock = fixed_clock();
        let store = Arc::new(InMemoryDocumentStore::new());
        let gateway = Arc::new(gateway);
        let service = Arc::new(SendToAuthority::new(
            Arc::new(JsonDocumentSerializer),
            Arc::new(FakeSigner),
            gateway.clone(),
            store.clone(),
            Arc::new(clock.clone()),
        ));
        Self {
            clock,
            store,
            gateway,
            service,
        }
    }

    pub(crate) fn stored(&self, document: &Document) -> Document {
        self.store.find_by_id(document.id_typed()).unwrap().unwrap()
    }
}
