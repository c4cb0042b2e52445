//! Credential Exchanger
//!
//! Trades a custom token for an ID token at the identity provider's
//! `accounts:signInWithCustomToken` endpoint. One request, no retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{IdentityError, Result};
use crate::types::{Assertion, BearerCredential};

/// Path of the sign-in endpoint below the provider base URL
pub const SIGN_IN_PATH: &str = "identitytoolkit.googleapis.com/v1/accounts:signInWithCustomToken";

/// Exchanges an assertion for a bearer credential
#[async_trait]
pub trait CredentialExchanger: Send + Sync {
    /// Exchange an assertion
    ///
    /// # Returns
    /// * `Ok(BearerCredential)` - the provider issued an ID token
    /// * `Err(IdentityError::Exchange)` - non-success HTTP status
    /// * `Err(IdentityError::CredentialMissing)` - success without an ID token
    async fn exchange(&self, assertion: &Assertion) -> Result<BearerCredential>;

    /// Get a description of this exchanger (for logging)
    fn description(&self) -> &str {
        "credential exchanger"
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    token: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    /// Seconds, sent as a string by the provider
    expires_in: Option<serde_json::Value>,
}

impl SignInResponse {
    fn expires_in_secs(&self) -> Option<i64> {
        match self.expires_in.as_ref()? {
            serde_json::Value::String(s) => s.parse().ok(),
            serde_json::Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }
}

/// Exchanger for the identity toolkit REST API (and its emulator)
#[derive(Debug, Clone)]
pub struct IdentityToolkitExchanger {
    endpoint: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl IdentityToolkitExchanger {
    /// Create an exchanger for the provider at `base_url` (e.g. `http://127.0.0.1:9099`)
    pub fn new(base_url: &str, api_key: &str, http_client: reqwest::Client) -> Self {
        Self {
            endpoint: format!("{}/{}", base_url.trim_end_matches('/'), SIGN_IN_PATH),
            api_key: api_key.to_string(),
            http_client,
        }
    }

    /// Sign-in URL requests are sent to; the API key goes in the `key` query parameter
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CredentialExchanger for IdentityToolkitExchanger {
    async fn exchange(&self, assertion: &Assertion) -> Result<BearerCredential> {
        debug!(endpoint = %self.endpoint, "Exchanging custom token");

        let response = self
            .http_client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&SignInRequest {
                token: assertion.as_str(),
                return_secure_token: true,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Credential exchange rejected");
            return Err(IdentityError::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: SignInResponse = serde_json::from_str(&body).unwrap_or_else(|e| {
            debug!(error = %e, "Exchange response is not a sign-in payload");
            SignInResponse::default()
        });

        let id_token = parsed
            .id_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(IdentityError::CredentialMissing)?;

        let mut credential = BearerCredential::new(id_token);
        if let Some(refresh) = parsed.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            credential = credential.with_refresh_token(refresh);
        }
        if let Some(secs) = parsed.expires_in_secs() {
            credential = credential.with_expires_in(secs);
        }

        info!(
            credential = %credential,
            expires_at = ?credential.expires_at(),
            "Received idToken"
        );

        Ok(credential)
    }

    fn description(&self) -> &str {
        "identity toolkit custom-token exchanger"
    }
}
