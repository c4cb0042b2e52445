//! In-memory document store
//!
//! Applies the session policy model ([`tablecheck_core::allowed`]) to every
//! request and answers the way the emulator does: documents on success, a
//! `PERMISSION_DENIED` body with 403 on denial. Used to run the protocol
//! without any external service.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};

use tablecheck_core::protocol::FORBIDDEN;
use tablecheck_core::session::field;
use tablecheck_core::{
    allowed, Claims, DocumentPath, DocumentState, Fields, Operation, SessionPatch,
};
use tablecheck_identity::BearerCredential;

use super::{DocumentStore, StoreError, StoreResponse};

#[derive(Debug, Clone)]
struct StoredDocument {
    fields: Fields,
    create_time: DateTime<Utc>,
    update_time: DateTime<Utc>,
}

impl StoredDocument {
    fn state(&self) -> DocumentState {
        match self.fields.get(field::ACTIVE).and_then(|v| v.as_bool()) {
            Some(true) => DocumentState::Active,
            _ => DocumentState::Ended,
        }
    }
}

/// Who presented a request
enum Caller {
    Anonymous,
    Admin,
    Holder(Claims),
}

/// In-memory document store enforcing the session policy
#[derive(Debug)]
pub struct MemoryDocumentStore {
    project_id: String,
    grants: RwLock<HashMap<String, Claims>>,
    admin_tokens: RwLock<Vec<String>>,
    documents: RwLock<HashMap<DocumentPath, StoredDocument>>,
}

impl MemoryDocumentStore {
    /// Create an empty store
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            grants: RwLock::new(HashMap::new()),
            admin_tokens: RwLock::new(Vec::new()),
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Treat bearer `token` as carrying `claims`
    ///
    /// Unknown tokens are treated as carrying no claims at all.
    pub fn grant(&self, token: impl Into<String>, claims: Claims) {
        self.grants.write().unwrap().insert(token.into(), claims);
    }

    /// Let bearer `token` bypass the policy, like the emulator's `owner`
    pub fn grant_admin(&self, token: impl Into<String>) {
        self.admin_tokens.write().unwrap().push(token.into());
    }

    /// Stored fields of a document
    pub fn get(&self, path: &DocumentPath) -> Option<Fields> {
        self.documents
            .read()
            .unwrap()
            .get(path)
            .map(|doc| doc.fields.clone())
    }

    /// Number of stored documents across all collections
    pub fn len(&self) -> usize {
        self.documents.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Document paths in `collection`
    pub fn paths_in(&self, collection: &str) -> Vec<DocumentPath> {
        let mut paths: Vec<DocumentPath> = self
            .documents
            .read()
            .unwrap()
            .keys()
            .filter(|path| path.collection == collection)
            .cloned()
            .collect();
        paths.sort_by(|a, b| a.id.cmp(&b.id));
        paths
    }

    fn caller(&self, credential: Option<&BearerCredential>) -> Caller {
        let Some(credential) = credential else {
            return Caller::Anonymous;
        };
        let token = credential.token();

        if self.admin_tokens.read().unwrap().iter().any(|t| t == token) {
            return Caller::Admin;
        }

        let claims = self
            .grants
            .read()
            .unwrap()
            .get(token)
            .cloned()
            .unwrap_or_default();
        Caller::Holder(claims)
    }

    fn permits(&self, caller: &Caller, operation: Operation, state: DocumentState) -> bool {
        match caller {
            Caller::Admin => true,
            Caller::Anonymous => allowed(operation, None, state),
            Caller::Holder(claims) => allowed(operation, Some(claims), state),
        }
    }

    fn resource_name(&self, path: &DocumentPath) -> String {
        format!(
            "projects/{}/databases/(default)/documents/{}",
            self.project_id, path
        )
    }

    fn document_response(
        &self,
        status: u16,
        path: &DocumentPath,
        doc: &StoredDocument,
    ) -> StoreResponse {
        StoreResponse::new(
            status,
            json!({
                "name": self.resource_name(path),
                "fields": doc.fields,
                "createTime": doc.create_time.to_rfc3339_opts(SecondsFormat::Micros, true),
                "updateTime": doc.update_time.to_rfc3339_opts(SecondsFormat::Micros, true),
            }),
        )
    }

    fn denied(operation: Operation, path: &str) -> StoreResponse {
        debug!(operation = %operation, path = %path, "Policy denied request");
        StoreResponse::new(FORBIDDEN, permission_denied_body())
    }
}

/// Error body the emulator sends with a 403
pub fn permission_denied_body() -> Value {
    json!({
        "error": {
            "code": FORBIDDEN,
            "message": "Missing or insufficient permissions.",
            "status": "PERMISSION_DENIED"
        }
    })
}

/// 20-character document id, like the store assigns
fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..20].to_string()
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(
        &self,
        collection: &str,
        fields: &Fields,
        credential: Option<&BearerCredential>,
    ) -> Result<StoreResponse, StoreError> {
        let caller = self.caller(credential);
        if !self.permits(&caller, Operation::Create, DocumentState::NotCreated) {
            return Ok(Self::denied(Operation::Create, collection));
        }

        let now = Utc::now();
        let path = DocumentPath::new(collection, new_document_id());
        let doc = StoredDocument {
            fields: fields.clone(),
            create_time: now,
            update_time: now,
        };

        info!(path = %path, "Created document");
        let response = self.document_response(200, &path, &doc);
        self.documents.write().unwrap().insert(path, doc);
        Ok(response)
    }

    async fn read(
        &self,
        path: &DocumentPath,
        credential: Option<&BearerCredential>,
    ) -> Result<StoreResponse, StoreError> {
        let caller = self.caller(credential);
        let documents = self.documents.read().unwrap();
        let stored = documents.get(path);
        let state = stored.map_or(DocumentState::NotCreated, StoredDocument::state);

        match stored {
            Some(doc) if self.permits(&caller, Operation::Read, state) => {
                Ok(self.document_response(200, path, doc))
            }
            _ => Ok(Self::denied(Operation::Read, &path.to_string())),
        }
    }

    async fn patch(
        &self,
        path: &DocumentPath,
        fields: &Fields,
        mask: &[String],
        credential: Option<&BearerCredential>,
    ) -> Result<StoreResponse, StoreError> {
        let caller = self.caller(credential);
        let mut documents = self.documents.write().unwrap();

        let Some(doc) = documents.get_mut(path) else {
            return Ok(Self::denied(Operation::Patch, &path.to_string()));
        };
        if !self.permits(&caller, Operation::Patch, doc.state()) {
            return Ok(Self::denied(Operation::Patch, &path.to_string()));
        }

        let patch = SessionPatch {
            fields: fields.clone(),
            mask: mask.to_vec(),
        };
        patch.apply(&mut doc.fields);
        doc.update_time = Utc::now();

        info!(path = %path, mask = ?mask, "Patched document");
        Ok(self.document_response(200, path, doc))
    }

    fn description(&self) -> &str {
        "in-memory policy store"
    }
}
