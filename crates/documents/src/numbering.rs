//! Document numbering: the `EEE-PPP-NNNNNNN` triple and the authorization
//! window that makes a number usable.

use core::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use facturo_core::{DomainError, DomainResult, ValueObject};

const MAX_BRANCH: u16 = 999;
const MAX_SEQUENCE: u32 = 9_999_999;
const MAX_AUTHORIZATION: u32 = 99_999_999;

/// Establishment / point-of-sale / sequence triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentNumber {
    establishment: u16,
    point_of_sale: u16,
    sequence: u32,
}

impl ValueObject for DocumentNumber {}

impl DocumentNumber {
    pub fn new(establishment: u16, point_of_sale: u16, sequence: u32) -> DomainResult<Self> {
        if !(1..=MAX_BRANCH).contains(&establishment) {
            return Err(DomainError::invalid_document_number(format!(
                "establishment {establishment} outside 1..={MAX_BRANCH}"
            )));
        }
        if !(1..=MAX_BRANCH).contains(&point_of_sale) {
            return Err(DomainError::invalid_document_number(format!(
                "point of sale {point_of_sale} outside 1..={MAX_BRANCH}"
            )));
        }
        if !(1..=MAX_SEQUENCE).contains(&sequence) {
            return Err(DomainError::invalid_document_number(format!(
                "sequence {sequence} outside 1..={MAX_SEQUENCE}"
            )));
        }
        Ok(Self {
            establishment,
            point_of_sale,
            sequence,
        })
    }

    pub fn establishment(&self) -> u16 {
        self.establishment
    }

    pub fn point_of_sale(&self) -> u16 {
        self.point_of_sale
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// The following number on the same establishment and point of sale.
    pub fn next(&self) -> DomainResult<Self> {
        Self::new(self.establishment, self.point_of_sale, self.sequence + 1)
    }
}

impl core::fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:03}-{:03}-{:07}",
            self.establishment, self.point_of_sale, self.sequence
        )
    }
}

impl FromStr for DocumentNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        let [establishment, point_of_sale, sequence] = parts.as_slice() else {
            return Err(DomainError::invalid_document_number(format!(
                "expected EEE-PPP-NNNNNNN, got {s:?}"
            )));
        };

        fn field<T: FromStr>(raw: &str, width: usize, name: &str) -> DomainResult<T> {
            if raw.len() != width || !raw.bytes().all(|b| b.is_ascii_digit()) {
                return Err(DomainError::invalid_document_number(format!(
                    "{name} must be {width} digits"
                )));
            }
            raw.parse()
                .map_err(|_| DomainError::invalid_document_number(format!("{name} is not a number")))
        }

        Self::new(
            field(establishment, 3, "establishment")?,
            field(point_of_sale, 3, "point of sale")?,
            field(sequence, 7, "sequence")?,
        )
    }
}

/// The merchant's currently valid numbering authorization: which branch it
/// covers, which sequence range, and for which dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingAuthorization {
    number: u32,
    establishment: u16,
    point_of_sale: u16,
    range_start: u32,
    range_end: u32,
    valid_from: NaiveDate,
    valid_until: Option<NaiveDate>,
}

impl NumberingAuthorization {
    pub fn new(
        number: u32,
        establishment: u16,
        point_of_sale: u16,
        range: (u32, u32),
        valid_from: NaiveDate,
        valid_until: Option<NaiveDate>,
    ) -> DomainResult<Self> {
        if !(1..=MAX_AUTHORIZATION).contains(&number) {
            return Err(DomainError::validation("authorization number must have 1 to 8 digits"));
        }
        // Validates the branch pair and both ends of the range in one go.
        DocumentNumber::new(establishment, point_of_sale, range.0)?;
        DocumentNumber::new(establishment, point_of_sale, range.1)?;
        if range.0 > range.1 {
            return Err(DomainError::validation("authorization range start exceeds its end"));
        }
        if valid_until.is_some_and(|until| until < valid_from) {
            return Err(DomainError::validation("authorization expires before it starts"));
        }
        Ok(Self {
            number,
            establishment,
            point_of_sale,
            range_start: range.0,
            range_end: range.1,
            valid_from,
            valid_until,
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn establishment(&self) -> u16 {
        self.establishment
    }

    pub fn point_of_sale(&self) -> u16 {
        self.point_of_sale
    }

    pub fn range(&self) -> (u32, u32) {
        (self.range_start, self.range_end)
    }

    pub fn valid_from(&self) -> NaiveDate {
        self.valid_from
    }

    pub fn valid_until(&self) -> Option<NaiveDate> {
        self.valid_until
    }

    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        date >= self.valid_from && self.valid_until.is_none_or(|until| date <= until)
    }

    /// Whether `from..=to` lies inside the authorized sequence range.
    pub fn contains_range(&self, from: u32, to: u32) -> bool {
        from <= to && from >= self.range_start && to <= self.range_end
    }

    /// Ensure `number` may be used on `date` under this authorization.
    pub fn check(&self, number: &DocumentNumber, date: NaiveDate) -> DomainResult<()> {
        if number.establishment() != self.establishment
            || number.point_of_sale() != self.point_of_sale
        {
            return Err(DomainError::validation(format!(
                "document number {number} does not belong to authorization {}",
                self.number
            )));
        }
        if !self.contains_range(number.sequence(), number.sequence()) {
            return Err(DomainError::validation(format!(
                "sequence {} outside authorized range {}..={}",
                number.sequence(),
                self.range_start,
                self.range_end
            )));
        }
        if !self.is_valid_on(date) {
            return Err(DomainError::validation(format!(
                "authorization {} is not valid on {date}",
                self.number
            )));
        }
        Ok(())
    }
}
