//! 44-digit control code (CDC).
//!
//! Layout, left to right:
//!
//! | digits | field |
//! |---|---|
//! | 2 | document type |
//! | 8 | owner tax id, zero-padded |
//! | 1 | tax id check digit |
//! | 3 | establishment |
//! | 3 | point of sale |
//! | 7 | sequence |
//! | 1 | taxpayer kind |
//! | 8 | emission date (`YYYYMMDD`) |
//! | 1 | emission mode |
//! | 9 | security code |
//! | 1 | check digit |

use core::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};

use facturo_core::{DomainError, DomainResult, ValueObject};

use crate::catalog::{DocumentType, EmissionMode, TaxpayerKind};
use crate::numbering::DocumentNumber;

/// Total length of a control code.
pub const CONTROL_CODE_LEN: usize = 44;
const PAYLOAD_LEN: usize = CONTROL_CODE_LEN - 1;
const MAX_SECURITY_CODE: u32 = 999_999_999;
const MAX_TAX_ID_LEN: usize = 8;

/// Everything a control code is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCodeParams {
    pub document_type: DocumentType,
    /// Owner tax id digits, without check digit (at most 8).
    pub tax_id: String,
    pub tax_id_check_digit: u8,
    pub number: DocumentNumber,
    pub taxpayer_kind: TaxpayerKind,
    pub emission_date: NaiveDate,
    pub emission_mode: EmissionMode,
    /// Filled with a random 9-digit value when absent.
    pub security_code: Option<u32>,
}

/// A validated 44-digit control code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ControlCode(String);

impl ValueObject for ControlCode {}

impl ControlCode {
    /// Build a control code from its parts.
    pub fn generate(params: &ControlCodeParams) -> DomainResult<Self> {
        let tax_id = &params.tax_id;
        if tax_id.is_empty() || tax_id.len() > MAX_TAX_ID_LEN {
            return Err(DomainError::validation(format!(
                "tax id must have 1 to {MAX_TAX_ID_LEN} digits, got {}",
                tax_id.len()
            )));
        }
        if !tax_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::validation("tax id must be numeric"));
        }
        if params.tax_id_check_digit > 9 {
            return Err(DomainError::validation("tax id check digit must be a single digit"));
        }

        let year = params.emission_date.year();
        if !(1000..=9999).contains(&year) {
            return Err(DomainError::validation(format!(
                "emission year {year} cannot be encoded in eight digits"
            )));
        }

        let security_code = match params.security_code {
            Some(code) if code > MAX_SECURITY_CODE => {
                return Err(DomainError::validation("security code must have at most 9 digits"));
            }
            Some(code) => code,
            None => rand::thread_rng().gen_range(0..=MAX_SECURITY_CODE),
        };

        let payload = format!(
            "{:02}{:0>8}{}{:03}{:03}{:07}{}{}{}{:09}",
            params.document_type.code(),
            tax_id,
            params.tax_id_check_digit,
            params.number.establishment(),
            params.number.point_of_sale(),
            params.number.sequence(),
            params.taxpayer_kind.code(),
            params.emission_date.format("%Y%m%d"),
            params.emission_mode.code(),
            security_code,
        );
        debug_assert_eq!(payload.len(), PAYLOAD_LEN);

        let check_digit = Self::compute_check_digit(&payload)?;
        Ok(Self(format!("{payload}{check_digit}")))
    }

    /// Parse and verify a control code.
    pub fn parse(value: &str) -> DomainResult<Self> {
        if value.len() != CONTROL_CODE_LEN {
            return Err(DomainError::invalid_control_code(format!(
                "expected {CONTROL_CODE_LEN} digits, got {}",
                value.len()
            )));
        }
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::invalid_control_code("contains non-digit characters"));
        }

        let (payload, trailing) = value.split_at(PAYLOAD_LEN);
        let expected = Self::compute_check_digit(payload)?;
        let found = trailing.as_bytes()[0] - b'0';
        if expected != found {
            return Err(DomainError::invalid_control_code(format!(
                "check digit mismatch (expected {expected}, found {found})"
            )));
        }

        Ok(Self(value.to_string()))
    }

    /// Modulus-11 check digit over a 43-digit payload.
    pub fn compute_check_digit(payload: &str) -> DomainResult<u8> {
        if payload.len() != PAYLOAD_LEN || !payload.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::invalid_control_code(format!(
                "check digit payload must be {PAYLOAD_LEN} digits"
            )));
        }
        Ok(modulus11(payload.as_bytes(), 9))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn document_type_code(&self) -> &str {
        &self.0[0..2]
    }

    pub fn tax_id(&self) -> &str {
        &self.0[2..10]
    }

    pub fn tax_id_check_digit(&self) -> u8 {
        self.digit(10)
    }

    pub fn establishment(&self) -> &str {
        &self.0[11..14]
    }

    pub fn point_of_sale(&self) -> &str {
        &self.0[14..17]
    }

    pub fn sequence(&self) -> &str {
        &self.0[17..24]
    }

    pub fn taxpayer_kind_code(&self) -> u8 {
        self.digit(24)
    }

    /// Emission date, if the encoded digits form a calendar date.
    pub fn emission_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.0[25..33], "%Y%m%d").ok()
    }

    pub fn emission_mode_code(&self) -> u8 {
        self.digit(33)
    }

    pub fn security_code(&self) -> &str {
        &self.0[34..43]
    }

    pub fn check_digit(&self) -> u8 {
        self.digit(43)
    }

    fn digit(&self, index: usize) -> u8 {
        self.0.as_bytes()[index] - b'0'
    }
}

/// Weighted modulus-11 over ASCII digits, scanning right to left with factors
/// `2..=max_factor` (wrapping back to 2).
pub(crate) fn modulus11(digits: &[u8], max_factor: u32) -> u8 {
    let mut factor = 2u32;
    let mut sum = 0u32;
    for d in digits.iter().rev() {
        sum += u32::from(d - b'0') * factor;
        factor = if factor == max_factor { 2 } else { factor + 1 };
    }
    let remainder = sum % 11;
    if remainder <= 1 { 0 } else { (11 - remainder) as u8 }
}

impl core::fmt::Display for ControlCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ControlCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ControlCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ControlCode> for String {
    fn from(value: ControlCode) -> Self {
        value.0
    }
}
