//! Document store abstraction
//!
//! The verifier only needs three operations from the store: create a document
//! in a collection, read it back, and apply a masked patch. Each returns the
//! raw status and body so authorization outcomes can be judged by the caller.
//!
//! - [`RestDocumentStore`] talks to the Firestore REST API (or its emulator)
//! - [`MemoryDocumentStore`] enforces the session policy model in-process

pub mod memory;
pub mod rest;

pub use memory::MemoryDocumentStore;
pub use rest::RestDocumentStore;

use async_trait::async_trait;
use serde_json::Value;

use tablecheck_core::{Document, DocumentPath, Fields, StatusClass};
use tablecheck_identity::BearerCredential;

/// Error type for store requests that produced no HTTP response
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}

/// Raw answer of the store to one request
#[derive(Debug, Clone, PartialEq)]
pub struct StoreResponse {
    pub status: u16,
    /// Parsed JSON; a non-JSON body is kept as a JSON string, an empty one as null
    pub body: Value,
}

impl StoreResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Build from raw response text
    pub fn from_text(status: u16, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        };
        Self { status, body }
    }

    pub fn class(&self) -> StatusClass {
        StatusClass::of(self.status)
    }

    /// Decode the body as a document, if it is one
    pub fn document(&self) -> Option<Document> {
        match &self.body {
            Value::Object(_) => Document::from_body(&self.body),
            _ => None,
        }
    }
}

/// Document store operations used by the verifier
///
/// A `None` credential sends the request without an `Authorization` header.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document with a store-assigned id
    async fn create(
        &self,
        collection: &str,
        fields: &Fields,
        credential: Option<&BearerCredential>,
    ) -> Result<StoreResponse, StoreError>;

    /// Read a document
    async fn read(
        &self,
        path: &DocumentPath,
        credential: Option<&BearerCredential>,
    ) -> Result<StoreResponse, StoreError>;

    /// Patch a document, touching only the fields named in `mask`
    async fn patch(
        &self,
        path: &DocumentPath,
        fields: &Fields,
        mask: &[String],
        credential: Option<&BearerCredential>,
    ) -> Result<StoreResponse, StoreError>;

    /// Get a description of this store (for logging)
    fn description(&self) -> &str {
        "document store"
    }
}
