//! Electronic document domain module.
//!
//! This crate contains the business rules for tax documents: the 44-digit
//! control code, the human numbering scheme, line items and totals, and the
//! acknowledgment state machine. Pure domain logic (no IO, no HTTP, no storage).

pub mod catalog;
pub mod control_code;
pub mod document;
pub mod line_item;
pub mod numbering;
pub mod tax_id;

pub use catalog::{DocumentType, EmissionMode, PaymentTerms, TaxRate, TaxpayerKind};
pub use control_code::{ControlCode, ControlCodeParams, CONTROL_CODE_LEN};
pub use document::{AuthorityAck, Document, DocumentDraft, DocumentStatus, Issuer};
pub use line_item::{DocumentTotals, LineItem};
pub use numbering::{DocumentNumber, NumberingAuthorization};
pub use tax_id::TaxId;
