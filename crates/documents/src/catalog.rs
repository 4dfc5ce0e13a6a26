//! Code catalogs shared with the tax authority.

use serde::{Deserialize, Serialize};

/// Kind of electronic document. The numeric code is the first two digits of
/// the control code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    CreditNote,
    DebitNote,
    ExportReceipt,
}

impl DocumentType {
    pub fn code(self) -> u8 {
        match self {
            DocumentType::Invoice => 1,
            DocumentType::CreditNote => 5,
            DocumentType::DebitNote => 6,
            DocumentType::ExportReceipt => 7,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(DocumentType::Invoice),
            5 => Some(DocumentType::CreditNote),
            6 => Some(DocumentType::DebitNote),
            7 => Some(DocumentType::ExportReceipt),
            _ => None,
        }
    }
}

/// Legal nature of the issuing taxpayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxpayerKind {
    Individual,
    Company,
}

impl TaxpayerKind {
    pub fn code(self) -> u8 {
        match self {
            TaxpayerKind::Individual => 1,
            TaxpayerKind::Company => 2,
        }
    }
}

/// Whether the document was issued online or while the authority was unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionMode {
    Normal,
    Contingency,
}

impl EmissionMode {
    pub fn code(self) -> u8 {
        match self {
            EmissionMode::Normal => 1,
            EmissionMode::Contingency => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTerms {
    Cash,
    Credit,
}

/// VAT rate applied to a line item. Prices are tax-inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxRate {
    Ten,
    Five,
    Exempt,
}
