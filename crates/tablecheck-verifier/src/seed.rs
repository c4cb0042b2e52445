//! Bulk seed loader
//!
//! Reads `{"<collection>": [{...}, ...], ...}` and creates every entry as a
//! new document with an administrative bearer, so the writes are not subject
//! to the access policy.
//!
//! With an emulator host configured the bearer is the emulator's owner token.
//! Otherwise the production store is written with an OAuth2 access token
//! granted to the service account key.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use tablecheck_core::value::fields_from_json;
use tablecheck_core::{Document, DocumentPath, Fields, StatusClass};
use tablecheck_identity::{AccessTokenGrant, BearerCredential, ServiceAccount};

use crate::config::VerifierConfig;
use crate::store::{DocumentStore, StoreResponse};

/// Bearer the store emulator treats as an administrator
pub const EMULATOR_OWNER_TOKEN: &str = "owner";

/// Production document store
pub const FIRESTORE_URL: &str = "https://firestore.googleapis.com";

/// Key file used for production seeding when none is configured
pub const DEFAULT_SEED_SERVICE_ACCOUNT: &str = "tool/serviceAccountKey.json";

/// Seed loading failures
#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Cannot read seed file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Malformed seed data: {0}")]
    Malformed(String),

    #[error("Store rejected seed entry {index} of '{collection}' with status {status}")]
    Rejected {
        collection: String,
        index: usize,
        status: u16,
        body: Value,
    },

    #[error("Transport error while seeding '{collection}': {message}")]
    Transport { collection: String, message: String },

    #[error("Cannot obtain seeding credential: {0}")]
    Credential(String),
}

/// Where seed data is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedMode {
    /// Store emulator, owner bearer
    Emulator,
    /// Production store, access token granted to this key file
    ServiceAccount(PathBuf),
}

impl SeedMode {
    /// Emulator when its host was given, otherwise the configured (or default) key file
    pub fn from_config(config: &VerifierConfig) -> Self {
        if config.store_emulator {
            return SeedMode::Emulator;
        }
        SeedMode::ServiceAccount(
            config
                .service_account
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SEED_SERVICE_ACCOUNT)),
        )
    }
}

/// Resolved destination of a seed run
#[derive(Debug, Clone)]
pub struct SeedTarget {
    pub base_url: String,
    pub project_id: String,
    pub credential: BearerCredential,
}

impl SeedTarget {
    /// Resolve `mode` against the configuration
    pub async fn resolve(
        mode: &SeedMode,
        config: &VerifierConfig,
        http_client: &reqwest::Client,
    ) -> Result<Self, SeedError> {
        match mode {
            SeedMode::Emulator => Ok(Self {
                base_url: config.store_base_url(),
                project_id: config.project_id.clone(),
                credential: BearerCredential::new(EMULATOR_OWNER_TOKEN),
            }),
            SeedMode::ServiceAccount(key_file) => {
                Self::service_account(key_file, &config.project_id, FIRESTORE_URL, http_client)
                    .await
            }
        }
    }

    /// Grant an access token to the key at `key_file` for the store at `store_url`
    ///
    /// The project named in the key file wins over `project_id`.
    pub async fn service_account(
        key_file: &Path,
        project_id: &str,
        store_url: &str,
        http_client: &reqwest::Client,
    ) -> Result<Self, SeedError> {
        if !key_file.exists() {
            return Err(SeedError::Credential(format!(
                "no service account key at {}; set FIRESTORE_EMULATOR_HOST to seed the emulator",
                key_file.display()
            )));
        }

        let account =
            ServiceAccount::from_file(key_file).map_err(|e| SeedError::Credential(e.to_string()))?;
        let project_id = account.project_id().unwrap_or(project_id).to_string();

        let credential = AccessTokenGrant::new(account, http_client.clone())
            .fetch()
            .await
            .map_err(|e| SeedError::Credential(e.to_string()))?;

        Ok(Self {
            base_url: store_url.trim_end_matches('/').to_string(),
            project_id,
            credential,
        })
    }
}

/// Parsed seed file, collections in name order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedFile {
    collections: BTreeMap<String, Vec<Fields>>,
}

impl SeedFile {
    /// Validate and convert a parsed seed document
    pub fn from_json(value: Value) -> Result<Self, SeedError> {
        let Value::Object(top) = value else {
            return Err(SeedError::Malformed(
                "top level must be an object of collections".into(),
            ));
        };

        let mut collections = BTreeMap::new();
        for (collection, entries) in top {
            let Value::Array(entries) = entries else {
                return Err(SeedError::Malformed(format!(
                    "collection '{}' must be an array",
                    collection
                )));
            };

            let mut documents = Vec::with_capacity(entries.len());
            for (index, entry) in entries.into_iter().enumerate() {
                let Value::Object(object) = entry else {
                    return Err(SeedError::Malformed(format!(
                        "entry {} of '{}' must be an object",
                        index, collection
                    )));
                };
                documents.push(fields_from_json(object));
            }
            collections.insert(collection, documents);
        }

        Ok(Self { collections })
    }

    /// Read and validate a seed file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let io_error = |message: String| SeedError::Io {
            path: path.display().to_string(),
            message,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| io_error(e.to_string()))?;
        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| SeedError::Malformed(format!("{}: {}", path.display(), e)))?;
        Self::from_json(value)
    }

    pub fn collections(&self) -> impl Iterator<Item = (&str, &[Fields])> {
        self.collections
            .iter()
            .map(|(name, docs)| (name.as_str(), docs.as_slice()))
    }

    /// Total number of entries across collections
    pub fn len(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Creates seed documents through a [`DocumentStore`]
pub struct SeedLoader<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    credential: BearerCredential,
}

impl<'a, S: DocumentStore + ?Sized> SeedLoader<'a, S> {
    /// Loader using the emulator's owner bearer
    pub fn new(store: &'a S) -> Self {
        Self::with_credential(store, BearerCredential::new(EMULATOR_OWNER_TOKEN))
    }

    pub fn with_credential(store: &'a S, credential: BearerCredential) -> Self {
        Self { store, credential }
    }

    /// Create every entry, stopping at the first failure
    pub async fn load(&self, seed: &SeedFile) -> Result<Vec<DocumentPath>, SeedError> {
        let mut created = Vec::with_capacity(seed.len());

        for (collection, documents) in seed.collections() {
            info!(collection, count = documents.len(), "Seeding collection");

            for (index, fields) in documents.iter().enumerate() {
                let response = self
                    .store
                    .create(collection, fields, Some(&self.credential))
                    .await
                    .map_err(|e| SeedError::Transport {
                        collection: collection.to_string(),
                        message: e.to_string(),
                    })?;

                let path = match response.class() {
                    StatusClass::Success(_) => created_path(&response),
                    _ => None,
                };
                match path {
                    Some(path) => {
                        info!(collection, id = %path.id, "Created seed document");
                        created.push(path);
                    }
                    None => {
                        warn!(collection, index, status = response.status, "Seed entry rejected");
                        return Err(SeedError::Rejected {
                            collection: collection.to_string(),
                            index,
                            status: response.status,
                            body: response.body,
                        });
                    }
                }
            }
        }

        Ok(created)
    }
}

fn created_path(response: &StoreResponse) -> Option<DocumentPath> {
    let doc: Document = response.document()?;
    DocumentPath::from_name(doc.name.as_deref()?).ok()
}
