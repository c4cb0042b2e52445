//! Verifier configuration
//!
//! Built once from the environment by the binaries and passed by value into
//! each component. Components never read the environment themselves.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use tablecheck_identity::{CustomTokenIssuer, IdentityError};

pub const PROJECT_ID_VAR: &str = "FB_PROJECT_ID";
pub const AUTH_HOST_VAR: &str = "FIREBASE_AUTH_EMULATOR_HOST";
pub const STORE_HOST_VAR: &str = "FIRESTORE_EMULATOR_HOST";
pub const API_KEY_VAR: &str = "TABLECHECK_API_KEY";
pub const TIMEOUT_VAR: &str = "TABLECHECK_HTTP_TIMEOUT_SECS";
pub const SERVICE_ACCOUNT_VAR: &str = "TABLECHECK_SERVICE_ACCOUNT";
pub const COLLECTION_VAR: &str = "TABLECHECK_COLLECTION";
pub const TOKEN_FILE_VAR: &str = "TABLECHECK_TOKEN_FILE";
pub const SEED_FILE_VAR: &str = "TABLECHECK_SEED_FILE";

pub const DEFAULT_PROJECT_ID: &str = "demo-no-project";
pub const DEFAULT_AUTH_HOST: &str = "127.0.0.1:9099";
pub const DEFAULT_STORE_HOST: &str = "127.0.0.1:8080";
pub const DEFAULT_API_KEY: &str = "fake";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TOKEN_FILE: &str = "token.json";
pub const DEFAULT_SEED_FILE: &str = "tool/seed_data.json";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration: {0} is set but empty")]
    Missing(&'static str),

    #[error("Invalid configuration: {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),
}

/// Everything the verifier and its collaborators need to reach the services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    pub project_id: String,
    /// Identity provider host (`host:port`) or base URL
    pub auth_host: String,
    /// Document store host (`host:port`) or base URL
    pub store_host: String,
    /// Set when the store host came from the environment; the seed loader
    /// then writes to the emulator instead of the production store
    pub store_emulator: bool,
    pub api_key: String,
    /// Bound on every HTTP request
    pub request_timeout: Duration,
    /// Service account key file; unsigned emulator tokens when absent
    pub service_account: Option<PathBuf>,
    /// Collection holding the session under test
    pub collection: String,
    /// Output of the token minter
    pub token_file: PathBuf,
    /// Input of the seed loader
    pub seed_file: PathBuf,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            project_id: DEFAULT_PROJECT_ID.to_string(),
            auth_host: DEFAULT_AUTH_HOST.to_string(),
            store_host: DEFAULT_STORE_HOST.to_string(),
            store_emulator: false,
            api_key: DEFAULT_API_KEY.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            service_account: None,
            collection: tablecheck_core::session::SESSIONS_COLLECTION.to_string(),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            seed_file: PathBuf::from(DEFAULT_SEED_FILE),
        }
    }
}

impl VerifierConfig {
    /// Read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from a variable lookup; unset variables take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let read = |var: &'static str| -> Result<Option<String>, ConfigError> {
            match lookup(var) {
                Some(value) if value.trim().is_empty() => Err(ConfigError::Missing(var)),
                Some(value) => Ok(Some(value.trim().to_string())),
                None => Ok(None),
            }
        };

        let request_timeout = match read(TIMEOUT_VAR)? {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::Invalid {
                    var: TIMEOUT_VAR,
                    reason: format!("'{}' is not a number of seconds", raw),
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        var: TIMEOUT_VAR,
                        reason: "timeout must be at least one second".into(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => defaults.request_timeout,
        };

        let store_host = read(STORE_HOST_VAR)?;

        Ok(Self {
            project_id: read(PROJECT_ID_VAR)?.unwrap_or(defaults.project_id),
            auth_host: read(AUTH_HOST_VAR)?.unwrap_or(defaults.auth_host),
            store_emulator: store_host.is_some(),
            store_host: store_host.unwrap_or(defaults.store_host),
            api_key: read(API_KEY_VAR)?.unwrap_or(defaults.api_key),
            request_timeout,
            service_account: read(SERVICE_ACCOUNT_VAR)?.map(PathBuf::from),
            collection: read(COLLECTION_VAR)?.unwrap_or(defaults.collection),
            token_file: read(TOKEN_FILE_VAR)?
                .map(PathBuf::from)
                .unwrap_or(defaults.token_file),
            seed_file: read(SEED_FILE_VAR)?
                .map(PathBuf::from)
                .unwrap_or(defaults.seed_file),
        })
    }

    pub fn auth_base_url(&self) -> String {
        base_url(&self.auth_host)
    }

    pub fn store_base_url(&self) -> String {
        base_url(&self.store_host)
    }

    /// HTTP client shared by the exchanger and the document store
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))
    }

    /// Custom-token issuer for the configured signing identity
    pub fn issuer(&self) -> Result<CustomTokenIssuer, IdentityError> {
        match &self.service_account {
            Some(path) => CustomTokenIssuer::from_service_account_file(path),
            None => Ok(CustomTokenIssuer::emulator()),
        }
    }
}

/// `host:port` becomes `http://host:port`; full URLs are kept
fn base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = VerifierConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config, VerifierConfig::default());
        assert_eq!(config.auth_base_url(), "http://127.0.0.1:9099");
        assert_eq!(config.store_base_url(), "http://127.0.0.1:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.collection, "sessions");
        assert!(!config.store_emulator);
    }

    #[test]
    fn test_overrides() {
        let config = VerifierConfig::from_lookup(lookup(&[
            (PROJECT_ID_VAR, "demo-restaurant"),
            (AUTH_HOST_VAR, "localhost:9199"),
            (STORE_HOST_VAR, "http://firestore.local:8081/"),
            (TIMEOUT_VAR, "3"),
            (SERVICE_ACCOUNT_VAR, "/secrets/sa.json"),
        ]))
        .unwrap();

        assert_eq!(config.project_id, "demo-restaurant");
        assert_eq!(config.auth_base_url(), "http://localhost:9199");
        assert_eq!(config.store_base_url(), "http://firestore.local:8081");
        assert!(config.store_emulator);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.service_account, Some(PathBuf::from("/secrets/sa.json")));
    }

    #[test]
    fn test_empty_value_is_missing() {
        let result = VerifierConfig::from_lookup(lookup(&[(PROJECT_ID_VAR, "  ")]));
        assert_eq!(result, Err(ConfigError::Missing(PROJECT_ID_VAR)));
    }

    #[test]
    fn test_bad_timeout() {
        let result = VerifierConfig::from_lookup(lookup(&[(TIMEOUT_VAR, "ten")]));
        assert!(matches!(result, Err(ConfigError::Invalid { var: TIMEOUT_VAR, .. })));

        let result = VerifierConfig::from_lookup(lookup(&[(TIMEOUT_VAR, "0")]));
        assert!(matches!(result, Err(ConfigError::Invalid { var: TIMEOUT_VAR, .. })));
    }

    #[test]
    fn test_issuer_selection() {
        let emulator = VerifierConfig::default().issuer().unwrap();
        assert!(matches!(
            emulator.identity(),
            tablecheck_identity::SigningIdentity::Emulator
        ));

        let config = VerifierConfig {
            service_account: Some(PathBuf::from("/nonexistent/sa.json")),
            ..Default::default()
        };
        assert!(matches!(config.issuer(), Err(IdentityError::Issuance(_))));
    }
}
