//! Taxpayer registry lookup.

use std::sync::Arc;

use tracing::debug;

use facturo_documents::TaxId;

use crate::error::SyncError;
use crate::ports::{AuthorityGateway, TaxpayerRecord};

pub struct LookupTaxpayer {
    gateway: Arc<dyn AuthorityGateway>,
}

impl LookupTaxpayer {
    pub fn new(gateway: Arc<dyn AuthorityGateway>) -> Self {
        Self { gateway }
    }

    /// Look up an `NNNNNNNN-D` tax id. Malformed ids never reach the authority.
    pub fn lookup(&self, tax_id: &str) -> Result<TaxpayerRecord, SyncError> {
        let tax_id: TaxId = tax_id.trim().parse()?;
        let record = self
            .gateway
            .lookup_tax_id(&tax_id)
            .map_err(SyncError::transmission)?;
        debug!(tax_id = %tax_id, found = record.found, "taxpayer lookup");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncErrorKind;
    use crate::test_support::FakeGateway;

    #[test]
    fn finds_registered_taxpayer() {
        let lookup = LookupTaxpayer::new(Arc::new(FakeGateway::accepting()));
        let record = lookup.lookup(" 80069563-1 ").unwrap();
        assert!(record.found);
        assert_eq!(record.legal_name.as_deref(), Some("Comercial Guarani SA"));
    }

    #[test]
    fn unknown_taxpayer_is_not_an_error() {
        let lookup = LookupTaxpayer::new(Arc::new(FakeGateway::accepting()));
        let record = lookup.lookup("1234567-9").unwrap();
        assert!(!record.found);
        assert!(record.legal_name.is_none());
    }

    #[test]
    fn malformed_tax_id_is_rejected_locally() {
        let lookup = LookupTaxpayer::new(Arc::new(FakeGateway::accepting()));
        assert_eq!(
            lookup.lookup("80069563-7").unwrap_err().kind(),
            SyncErrorKind::Validation
        );
        assert_eq!(lookup.lookup("abc").unwrap_err().kind(), SyncErrorKind::Validation);
    }
}
