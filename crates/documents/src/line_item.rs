//! Line items and derived document totals.

use serde::{Deserialize, Serialize};

use facturo_core::{DomainError, DomainResult};

use crate::catalog::TaxRate;

/// A single invoiced line. Amounts are whole currency units (no sub-units).
///
/// Fields are public for reading; documents re-check every item with
/// [`LineItem::validate`] before accepting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LineItemFields")]
pub struct LineItem {
    pub description: String,
    pub quantity: u32,
    /// Tax-inclusive unit price.
    pub unit_price: u64,
    pub tax_rate: TaxRate,
}

impl LineItem {
    pub fn new(
        description: impl Into<String>,
        quantity: u32,
        unit_price: u64,
        tax_rate: TaxRate,
    ) -> DomainResult<Self> {
        let item = Self {
            description: description.into(),
            quantity,
            unit_price,
            tax_rate,
        };
        item.validate()?;
        Ok(item)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.description.trim().is_empty() {
            return Err(DomainError::validation("line item description is required"));
        }
        if self.quantity == 0 {
            return Err(DomainError::validation("line item quantity must be positive"));
        }
        Ok(())
    }

    pub fn amount(&self) -> DomainResult<u64> {
        u64::from(self.quantity)
            .checked_mul(self.unit_price)
            .ok_or_else(|| DomainError::invariant("line item amount overflow"))
    }
}

#[derive(Deserialize)]
struct LineItemFields {
    description: String,
    quantity: u32,
    unit_price: u64,
    tax_rate: TaxRate,
}

impl TryFrom<LineItemFields> for LineItem {
    type Error = DomainError;

    fn try_from(f: LineItemFields) -> Result<Self, Self::Error> {
        LineItem::new(f.description, f.quantity, f.unit_price, f.tax_rate)
    }
}

/// Totals derived from a document's items.
///
/// Prices include VAT, so each taxed bucket splits into a base and the tax
/// embedded in it (`gross / 11` at 10%, `gross / 21` at 5%, rounded half up).
/// `gross == base_10 + tax_10 + base_5 + tax_5 + exempt` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub gross: u64,
    pub base_10: u64,
    pub tax_10: u64,
    pub base_5: u64,
    pub tax_5: u64,
    pub exempt: u64,
    pub total_tax: u64,
}

impl DocumentTotals {
    pub fn from_items(items: &[LineItem]) -> DomainResult<Self> {
        let mut gross_10: u64 = 0;
        let mut gross_5: u64 = 0;
        let mut exempt: u64 = 0;

        for item in items {
            let amount = item.amount()?;
            let bucket = match item.tax_rate {
                TaxRate::Ten => &mut gross_10,
                TaxRate::Five => &mut gross_5,
                TaxRate::Exempt => &mut exempt,
            };
            *bucket = bucket
                .checked_add(amount)
                .ok_or_else(|| DomainError::invariant("document total overflow"))?;
        }

        let tax_10 = embedded_tax(gross_10, 11);
        let tax_5 = embedded_tax(gross_5, 21);
        let gross = gross_10
            .checked_add(gross_5)
            .and_then(|g| g.checked_add(exempt))
            .ok_or_else(|| DomainError::invariant("document total overflow"))?;

        Ok(Self {
            gross,
            base_10: gross_10 - tax_10,
            tax_10,
            base_5: gross_5 - tax_5,
            tax_5,
            exempt,
            total_tax: tax_10 + tax_5,
        })
    }
}

fn embedded_tax(gross: u64, divisor: u64) -> u64 {
    gross / divisor + u64::from(gross % divisor * 2 >= divisor)
}
