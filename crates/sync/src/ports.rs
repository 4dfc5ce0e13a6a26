//! External collaborators consumed by the sync engine.
//!
//! The engine only depends on these traits; wire formats, credentials and
//! storage engines live behind them.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use facturo_core::{DocumentId, MerchantId};
use facturo_documents::{ControlCode, Document, TaxId};

/// Document repository.
pub trait DocumentStore: Send + Sync {
    fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, StoreError>;

    /// Documents of a merchant that carry a control code and still await the
    /// authority (`Created` or `Submitted`).
    fn find_pending(&self, merchant_id: MerchantId) -> Result<Vec<Document>, StoreError>;

    fn save(&self, document: &Document) -> Result<(), StoreError>;
}

/// Document store error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("document storage error: {0}")]
    Storage(String),
}

/// Authority-ready representation of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPayload {
    pub document_id: DocumentId,
    pub merchant_id: MerchantId,
    pub control_code: ControlCode,
    pub content: String,
}

/// Payload plus the merchant's signature over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    pub payload: DocumentPayload,
    pub signature: String,
}

/// Turns a document into the authority's payload format.
pub trait DocumentSerializer: Send + Sync {
    fn serialize(&self, document: &Document) -> anyhow::Result<DocumentPayload>;
}

/// Signs payloads with the merchant's stored credential.
pub trait Signer: Send + Sync {
    fn sign(&self, merchant_id: MerchantId, payload: DocumentPayload) -> anyhow::Result<SignedPayload>;
}

/// Response code and message returned by the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityResponse {
    pub code: String,
    pub message: String,
}

/// Response to a document submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub code: String,
    pub message: String,
    /// Control code echoed by the authority.
    pub control_code: String,
}

/// Request to void an unused range of document numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberRangeVoid {
    pub authorization_number: u32,
    pub establishment: u16,
    pub point_of_sale: u16,
    pub from: u32,
    pub to: u32,
    pub reason: String,
}

/// Taxpayer registry lookup result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxpayerRecord {
    pub found: bool,
    pub legal_name: Option<String>,
}

/// The tax authority's endpoint. Calls block; timeouts are the gateway's job.
pub trait AuthorityGateway: Send + Sync {
    fn submit(&self, payload: &SignedPayload) -> anyhow::Result<SubmissionResponse>;

    fn cancel(&self, control_code: &ControlCode, reason: &str) -> anyhow::Result<AuthorityResponse>;

    fn void_number_range(&self, request: &NumberRangeVoid) -> anyhow::Result<AuthorityResponse>;

    fn lookup_tax_id(&self, tax_id: &TaxId) -> anyhow::Result<TaxpayerRecord>;
}

/// Serializes documents as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDocumentSerializer;

impl DocumentSerializer for JsonDocumentSerializer {
    fn serialize(&self, document: &Document) -> anyhow::Result<DocumentPayload> {
        let control_code = document
            .control_code()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("document {} has no control code", document.id_typed()))?;
        Ok(DocumentPayload {
            document_id: document.id_typed(),
            merchant_id: document.merchant_id(),
            control_code,
            content: serde_json::to_string(document)?,
        })
    }
}

/// In-memory document store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<DocumentId, Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<DocumentId, Document>>, StoreError> {
        self.documents
            .read()
            .map_err(|_| StoreError::Storage("document store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<DocumentId, Document>>, StoreError> {
        self.documents
            .write()
            .map_err(|_| StoreError::Storage("document store lock poisoned".to_string()))
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        Ok(self.read()?.get(&id).cloned())
    }

    fn find_pending(&self, merchant_id: MerchantId) -> Result<Vec<Document>, StoreError> {
        let documents = self.read()?;
        let mut pending: Vec<Document> = documents
            .values()
            .filter(|d| {
                d.merchant_id() == merchant_id
                    && d.status().is_pending()
                    && d.control_code().is_some()
            })
            .cloned()
            .collect();
        pending.sort_by_key(|d| d.emission_date());
        Ok(pending)
    }

    fn save(&self, document: &Document) -> Result<(), StoreError> {
        self.write()?.insert(document.id_typed(), document.clone());
        Ok(())
    }
}
