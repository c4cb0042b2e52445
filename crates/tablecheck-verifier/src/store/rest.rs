//! Firestore REST document store
//!
//! Documents live under
//! `{base}/v1/projects/{project}/databases/(default)/documents/{collection}/{id}`.
//! Requests are sent once; the client's timeout bounds each of them.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use tablecheck_core::{DocumentPath, Fields};
use tablecheck_identity::BearerCredential;

use super::{DocumentStore, StoreError, StoreResponse};

#[derive(Debug, Serialize)]
struct DocumentBody<'a> {
    fields: &'a Fields,
}

/// Document store backed by the Firestore REST API
#[derive(Debug, Clone)]
pub struct RestDocumentStore {
    documents_url: String,
    http_client: reqwest::Client,
}

impl RestDocumentStore {
    /// Create a store for `project_id` at `base_url` (e.g. `http://127.0.0.1:8080`)
    pub fn new(base_url: &str, project_id: &str, http_client: reqwest::Client) -> Self {
        Self {
            documents_url: format!(
                "{}/v1/projects/{}/databases/(default)/documents",
                base_url.trim_end_matches('/'),
                project_id
            ),
            http_client,
        }
    }

    /// Root URL all document paths are appended to
    pub fn documents_url(&self) -> &str {
        &self.documents_url
    }

    pub fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}", self.documents_url, collection)
    }

    pub fn document_url(&self, path: &DocumentPath) -> String {
        format!("{}/{}", self.documents_url, path)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        credential: Option<&BearerCredential>,
    ) -> Result<StoreResponse, StoreError> {
        let request = match credential {
            Some(credential) => request.bearer_auth(credential.token()),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        debug!(status, bytes = text.len(), "Store responded");
        Ok(StoreResponse::from_text(status, &text))
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn create(
        &self,
        collection: &str,
        fields: &Fields,
        credential: Option<&BearerCredential>,
    ) -> Result<StoreResponse, StoreError> {
        let url = self.collection_url(collection);
        debug!(url = %url, authorized = credential.is_some(), "POST document");

        let request = self.http_client.post(&url).json(&DocumentBody { fields });
        self.send(request, credential).await
    }

    async fn read(
        &self,
        path: &DocumentPath,
        credential: Option<&BearerCredential>,
    ) -> Result<StoreResponse, StoreError> {
        let url = self.document_url(path);
        debug!(url = %url, authorized = credential.is_some(), "GET document");

        self.send(self.http_client.get(&url), credential).await
    }

    async fn patch(
        &self,
        path: &DocumentPath,
        fields: &Fields,
        mask: &[String],
        credential: Option<&BearerCredential>,
    ) -> Result<StoreResponse, StoreError> {
        let url = self.document_url(path);
        debug!(url = %url, mask = ?mask, authorized = credential.is_some(), "PATCH document");

        let query: Vec<(&str, &str)> = mask
            .iter()
            .map(|field| ("updateMask.fieldPaths", field.as_str()))
            .collect();

        let request = self
            .http_client
            .patch(&url)
            .query(&query)
            .json(&DocumentBody { fields });
        self.send(request, credential).await
    }

    fn description(&self) -> &str {
        "firestore REST document store"
    }
}
