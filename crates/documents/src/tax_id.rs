//! Owner tax id (`NNNNNNNN-D`).

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use facturo_core::{DomainError, DomainResult, ValueObject};

use crate::control_code::modulus11;

const MAX_DIGITS: usize = 8;

/// Tax id digits plus their modulus-11 check digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaxId {
    number: String,
    check_digit: u8,
}

impl ValueObject for TaxId {}

impl TaxId {
    pub fn new(number: impl Into<String>, check_digit: u8) -> DomainResult<Self> {
        let number = number.into();
        if number.is_empty() || number.len() > MAX_DIGITS {
            return Err(DomainError::validation(format!(
                "tax id must have 1 to {MAX_DIGITS} digits"
            )));
        }
        if !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::validation("tax id must be numeric"));
        }
        let expected = Self::compute_check_digit(&number);
        if expected != check_digit {
            return Err(DomainError::validation(format!(
                "tax id check digit mismatch (expected {expected}, found {check_digit})"
            )));
        }
        Ok(Self {
            number,
            check_digit,
        })
    }

    /// Check digit for tax id digits (factors 2..=11).
    pub fn compute_check_digit(number: &str) -> u8 {
        modulus11(number.as_bytes(), 11)
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn check_digit(&self) -> u8 {
        self.check_digit
    }
}

impl core::fmt::Display for TaxId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}-{}", self.number, self.check_digit)
    }
}

impl FromStr for TaxId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, digit) = s
            .split_once('-')
            .ok_or_else(|| DomainError::validation("tax id must look like NNNNNNNN-D"))?;
        let digit = match digit.as_bytes() {
            [d] if d.is_ascii_digit() => d - b'0',
            _ => return Err(DomainError::validation("tax id check digit must be a single digit")),
        };
        Self::new(number, digit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_tax_ids() {
        let id: TaxId = "80069563-1".parse().unwrap();
        assert_eq!(id.number(), "80069563");
        assert_eq!(id.check_digit(), 1);
        assert_eq!(id.to_string(), "80069563-1");

        let short: TaxId = "1234567-9".parse().unwrap();
        assert_eq!(short.number(), "1234567");
    }

    #[test]
    fn rejects_wrong_check_digit() {
        assert!("80069563-2".parse::<TaxId>().is_err());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!("80069563".parse::<TaxId>().is_err());
        assert!("123456789-0".parse::<TaxId>().is_err());
        assert!("8006A563-1".parse::<TaxId>().is_err());
        assert!("80069563-12".parse::<TaxId>().is_err());
    }
}
