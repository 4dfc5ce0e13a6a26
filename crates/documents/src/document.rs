//! Document entity and its acknowledgment state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use facturo_core::{ClientId, DocumentId, DomainError, DomainResult, Entity, MerchantId};

use crate::catalog::{DocumentType, EmissionMode, PaymentTerms, TaxpayerKind};
use crate::control_code::{ControlCode, ControlCodeParams};
use crate::line_item::{DocumentTotals, LineItem};
use crate::numbering::{DocumentNumber, NumberingAuthorization};
use crate::tax_id::TaxId;

/// Acknowledgment lifecycle.
///
/// ```text
/// Created -> Submitted -> Accepted -> Voided
///              |   ^  \
///              +---+   -> Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Created,
    Submitted,
    Accepted,
    Rejected,
    Voided,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 5] = [
        DocumentStatus::Created,
        DocumentStatus::Submitted,
        DocumentStatus::Accepted,
        DocumentStatus::Rejected,
        DocumentStatus::Voided,
    ];

    /// Edges of the transition graph. `Submitted -> Submitted` records a
    /// repeated transmission attempt.
    pub fn can_transition_to(self, target: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, target),
            (Created, Submitted)
                | (Submitted, Submitted)
                | (Submitted, Accepted)
                | (Submitted, Rejected)
                | (Accepted, Voided)
        )
    }

    /// The authority has given a definitive answer.
    pub fn is_resolved(self) -> bool {
        matches!(
            self,
            DocumentStatus::Accepted | DocumentStatus::Rejected | DocumentStatus::Voided
        )
    }

    /// Still waiting for the authority.
    pub fn is_pending(self) -> bool {
        matches!(self, DocumentStatus::Created | DocumentStatus::Submitted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Created => "created",
            DocumentStatus::Submitted => "submitted",
            DocumentStatus::Accepted => "accepted",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Voided => "voided",
        }
    }
}

impl core::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The issuing merchant's fiscal identity, as needed for control codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuer {
    pub merchant_id: MerchantId,
    pub tax_id: TaxId,
    pub taxpayer_kind: TaxpayerKind,
}

/// Last response code/message received from the authority for a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityAck {
    pub code: String,
    pub message: String,
    pub received_at: DateTime<Utc>,
}

/// Input for creating a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDraft {
    pub id: DocumentId,
    pub merchant_id: MerchantId,
    pub client_id: ClientId,
    pub document_type: DocumentType,
    pub authorization: NumberingAuthorization,
    pub number: DocumentNumber,
    pub emission_mode: EmissionMode,
    pub payment_terms: PaymentTerms,
    pub emission_date: DateTime<Utc>,
    pub items: Vec<LineItem>,
}

/// Entity: an electronic tax document.
///
/// Items are editable only until the control code is assigned; after that the
/// document changes only through status transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    id: DocumentId,
    merchant_id: MerchantId,
    client_id: ClientId,
    document_type: DocumentType,
    authorization: NumberingAuthorization,
    number: DocumentNumber,
    emission_mode: EmissionMode,
    payment_terms: PaymentTerms,
    emission_date: DateTime<Utc>,
    items: Vec<LineItem>,
    totals: DocumentTotals,
    control_code: Option<ControlCode>,
    status: DocumentStatus,
    submission_attempts: u32,
    last_ack: Option<AuthorityAck>,
    void_reason: Option<String>,
}

impl Document {
    pub fn create(draft: DocumentDraft) -> DomainResult<Self> {
        for item in &draft.items {
            item.validate()?;
        }
        let totals = DocumentTotals::from_items(&draft.items)?;
        Ok(Self {
            id: draft.id,
            merchant_id: draft.merchant_id,
            client_id: draft.client_id,
            document_type: draft.document_type,
            authorization: draft.authorization,
            number: draft.number,
            emission_mode: draft.emission_mode,
            payment_terms: draft.payment_terms,
            emission_date: draft.emission_date,
            items: draft.items,
            totals,
            control_code: None,
            status: DocumentStatus::Created,
            submission_attempts: 0,
            last_ack: None,
            void_reason: None,
        })
    }

    pub fn id_typed(&self) -> DocumentId {
        self.id
    }

    pub fn merchant_id(&self) -> MerchantId {
        self.merchant_id
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    pub fn authorization(&self) -> &NumberingAuthorization {
        &self.authorization
    }

    pub fn number(&self) -> &DocumentNumber {
        &self.number
    }

    pub fn emission_mode(&self) -> EmissionMode {
        self.emission_mode
    }

    pub fn payment_terms(&self) -> PaymentTerms {
        self.payment_terms
    }

    pub fn emission_date(&self) -> DateTime<Utc> {
        self.emission_date
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn totals(&self) -> &DocumentTotals {
        &self.totals
    }

    pub fn control_code(&self) -> Option<&ControlCode> {
        self.control_code.as_ref()
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    /// How many times the document was marked as transmitted.
    pub fn submission_attempts(&self) -> u32 {
        self.submission_attempts
    }

    pub fn last_ack(&self) -> Option<&AuthorityAck> {
        self.last_ack.as_ref()
    }

    pub fn void_reason(&self) -> Option<&str> {
        self.void_reason.as_deref()
    }

    fn ensure_editable(&self) -> DomainResult<()> {
        if self.control_code.is_some() {
            return Err(DomainError::invariant(
                "items cannot change once the control code is assigned",
            ));
        }
        Ok(())
    }

    pub fn add_item(&mut self, item: LineItem) -> DomainResult<()> {
        self.ensure_editable()?;
        item.validate()?;
        let mut items = self.items.clone();
        items.push(item);
        self.totals = DocumentTotals::from_items(&items)?;
        self.items = items;
        Ok(())
    }

    pub fn remove_item(&mut self, index: usize) -> DomainResult<LineItem> {
        self.ensure_editable()?;
        if index >= self.items.len() {
            return Err(DomainError::validation(format!("no line item at index {index}")));
        }
        let removed = self.items.remove(index);
        self.totals = DocumentTotals::from_items(&self.items)?;
        Ok(removed)
    }

    /// Assign the control code. Happens once, while the document is `Created`.
    pub fn generate_control_code(
        &mut self,
        issuer: &Issuer,
        security_code: Option<u32>,
    ) -> DomainResult<&ControlCode> {
        if self.control_code.is_some() {
            return Err(DomainError::conflict("control code already assigned"));
        }
        if self.status != DocumentStatus::Created {
            return Err(DomainError::invariant(format!(
                "control code can only be generated for created documents (status: {})",
                self.status
            )));
        }
        if issuer.merchant_id != self.merchant_id {
            return Err(DomainError::invariant("issuer does not own this document"));
        }
        if self.items.is_empty() {
            return Err(DomainError::validation("document has no line items"));
        }
        for item in &self.items {
            item.validate()?;
        }

        let emission_day = self.emission_date.date_naive();
        self.authorization.check(&self.number, emission_day)?;

        let code = ControlCode::generate(&ControlCodeParams {
            document_type: self.document_type,
            tax_id: issuer.tax_id.number().to_string(),
            tax_id_check_digit: issuer.tax_id.check_digit(),
            number: self.number,
            taxpayer_kind: issuer.taxpayer_kind,
            emission_date: emission_day,
            emission_mode: self.emission_mode,
            security_code,
        })?;

        Ok(&*self.control_code.insert(code))
    }

    fn transition(&mut self, target: DocumentStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(target) {
            return Err(DomainError::invalid_transition(self.status, target));
        }
        if self.control_code.is_none() {
            return Err(DomainError::invariant(
                "control code must be assigned before leaving created",
            ));
        }
        self.status = target;
        Ok(())
    }

    /// Record a transmission attempt. Allowed again while already submitted.
    pub fn mark_submitted(&mut self) -> DomainResult<()> {
        self.transition(DocumentStatus::Submitted)?;
        self.submission_attempts += 1;
        Ok(())
    }

    pub fn mark_accepted(&mut self, ack: AuthorityAck) -> DomainResult<()> {
        self.transition(DocumentStatus::Accepted)?;
        self.last_ack = Some(ack);
        Ok(())
    }

    pub fn mark_rejected(&mut self, ack: AuthorityAck) -> DomainResult<()> {
        self.transition(DocumentStatus::Rejected)?;
        self.last_ack = Some(ack);
        Ok(())
    }

    /// Void an accepted document after the authority confirmed the cancellation.
    pub fn void(&mut self, reason: impl Into<String>, ack: AuthorityAck) -> DomainResult<()> {
        self.transition(DocumentStatus::Voided)?;
        self.void_reason = Some(reason.into());
        self.last_ack = Some(ack);
        Ok(())
    }
}

impl Entity for Document {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TaxRate;
    use chrono::{NaiveDate, TimeZone};

    fn issuer(merchant_id: MerchantId) -> Issuer {
        Issuer {
            merchant_id,
            tax_id: "80069563-1".parse().unwrap(),
            taxpayer_kind: TaxpayerKind::Company,
        }
    }

    fn draft(merchant_id: MerchantId) -> DocumentDraft {
        DocumentDraft {
            id: DocumentId::new(),
            merchant_id,
            client_id: ClientId::new(),
            document_type: DocumentType::Invoice,
            authorization: NumberingAuthorization::new(
                12_345_678,
                1,
                1,
                (1, 1_000),
                NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                None,
            )
            .unwrap(),
            number: DocumentNumber::new(1, 1, 7).unwrap(),
            emission_mode: EmissionMode::Normal,
            payment_terms: PaymentTerms::Cash,
            emission_date: Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
            items: vec![LineItem::new("coffee", 2, 11_000, TaxRate::Ten).unwrap()],
        }
    }

    fn ack(code: &str) -> AuthorityAck {
        AuthorityAck {
            code: code.to_string(),
            message: "ok".to_string(),
            received_at: Utc::now(),
        }
    }

    fn coded_document() -> Document {
        let merchant = MerchantId::new();
        let mut doc = Document::create(draft(merchant)).unwrap();
        doc.generate_control_code(&issuer(merchant), Some(1)).unwrap();
        doc
    }

    fn document_in(status: DocumentStatus) -> Document {
        let mut doc = coded_document();
        doc.status = status;
        doc
    }

    #[test]
    fn new_document_starts_created_with_totals() {
        let doc = Document::create(draft(MerchantId::new())).unwrap();
        assert_eq!(doc.status(), DocumentStatus::Created);
        assert!(doc.control_code().is_none());
        assert_eq!(doc.totals().gross, 22_000);
        assert_eq!(doc.totals().tax_10, 2_000);
        assert_eq!(Entity::id(&doc), &doc.id_typed());
    }

    #[test]
    fn totals_follow_item_changes() {
        let mut doc = Document::create(draft(MerchantId::new())).unwrap();
        doc.add_item(LineItem::new("bread", 1, 2_100, TaxRate::Five).unwrap())
            .unwrap();
        assert_eq!(doc.totals().gross, 24_100);
        assert_eq!(doc.totals().tax_5, 100);

        doc.remove_item(0).unwrap();
        assert_eq!(doc.totals().gross, 2_100);
        assert_eq!(doc.totals().tax_10, 0);
    }

    #[test]
    fn control_code_uses_issuer_and_number() {
        let doc = coded_document();
        let code = doc.control_code().unwrap();
        assert_eq!(code.document_type_code(), "01");
        assert_eq!(code.tax_id(), "80069563");
        assert_eq!(code.tax_id_check_digit(), 1);
        assert_eq!(code.sequence(), "0000007");
        assert_eq!(code.taxpayer_kind_code(), 2);
        assert_eq!(code.emission_date(), NaiveDate::from_ymd_opt(2026, 10, 19));
    }

    #[test]
    fn control_code_is_generated_once() {
        let mut doc = coded_document();
        let merchant = doc.merchant_id();
        let err = doc.generate_control_code(&issuer(merchant), None).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn control_code_requires_items() {
        let merchant = MerchantId::new();
        let mut d = draft(merchant);
        d.items.clear();
        let mut doc = Document::create(d).unwrap();
        let err = doc.generate_control_code(&issuer(merchant), None).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    fn invalid_item() -> LineItem {
        LineItem {
            description: String::new(),
            quantity: 0,
            unit_price: 1_000,
            tax_rate: TaxRate::Ten,
        }
    }

    #[test]
    fn create_rejects_invalid_items() {
        let mut d = draft(MerchantId::new());
        d.items.push(invalid_item());
        let err = Document::create(d).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn add_item_rejects_invalid_items() {
        let mut doc = Document::create(draft(MerchantId::new())).unwrap();
        assert!(doc.add_item(invalid_item()).is_err());
        assert_eq!(doc.items().len(), 1);
        assert_eq!(doc.totals().gross, 22_000);
    }

    #[test]
    fn control_code_refuses_invalid_items() {
        let merchant = MerchantId::new();
        let mut doc = Document::create(draft(merchant)).unwrap();
        doc.items.push(invalid_item());

        let err = doc.generate_control_code(&issuer(merchant), None).unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        assert!(doc.control_code().is_none());
    }

    #[test]
    fn control_code_requires_matching_issuer() {
        let mut doc = Document::create(draft(MerchantId::new())).unwrap();
        let err = doc
            .generate_control_code(&issuer(MerchantId::new()), None)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn control_code_requires_valid_authorization() {
        let merchant = MerchantId::new();
        let mut d = draft(merchant);
        d.number = DocumentNumber::new(1, 1, 1_001).unwrap();
        let mut doc = Document::create(d).unwrap();
        assert!(doc.generate_control_code(&issuer(merchant), None).is_err());
        assert!(doc.control_code().is_none());
    }

    #[test]
    fn items_are_locked_after_control_code() {
        let mut doc = coded_document();
        let err = doc
            .add_item(LineItem::new("late", 1, 10, TaxRate::Exempt).unwrap())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert!(doc.remove_item(0).is_err());
        assert_eq!(doc.items().len(), 1);
    }

    #[test]
    fn cannot_submit_without_control_code() {
        let mut doc = Document::create(draft(MerchantId::new())).unwrap();
        assert!(doc.mark_submitted().is_err());
        assert_eq!(doc.status(), DocumentStatus::Created);
    }

    #[test]
    fn accepted_path() {
        let mut doc = coded_document();
        doc.mark_submitted().unwrap();
        doc.mark_submitted().unwrap();
        assert_eq!(doc.submission_attempts(), 2);
        doc.mark_accepted(ack("0260")).unwrap();
        assert_eq!(doc.status(), DocumentStatus::Accepted);
        assert_eq!(doc.last_ack().unwrap().code, "0260");

        doc.void("duplicate sale", ack("0600")).unwrap();
        assert_eq!(doc.status(), DocumentStatus::Voided);
        assert_eq!(doc.void_reason(), Some("duplicate sale"));
    }

    #[test]
    fn rejected_path_cannot_be_voided() {
        let mut doc = coded_document();
        doc.mark_submitted().unwrap();
        doc.mark_rejected(ack("0160")).unwrap();
        assert_eq!(doc.status(), DocumentStatus::Rejected);

        let err = doc.void("nope", ack("0600")).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidStateTransition {
                from: "rejected".to_string(),
                to: "voided".to_string(),
            }
        );
    }

    #[test]
    fn transition_table_is_exhaustive() {
        use DocumentStatus::*;
        let allowed = [
            (Created, Submitted),
            (Submitted, Submitted),
            (Submitted, Accepted),
            (Submitted, Rejected),
            (Accepted, Voided),
        ];

        for from in DocumentStatus::ALL {
            for to in DocumentStatus::ALL {
                let mut doc = document_in(from);
                let result = doc.transition(to);
                if allowed.contains(&(from, to)) {
                    assert!(result.is_ok(), "{from} -> {to} should be allowed");
                    assert_eq!(doc.status(), to);
                } else {
                    assert_eq!(
                        result.unwrap_err(),
                        DomainError::invalid_transition(from, to),
                        "{from} -> {to} should be rejected"
                    );
                    assert_eq!(doc.status(), from);
                }
            }
        }
    }
}
