//! Service Access Tokens
//!
//! OAuth2 JWT-bearer grant: an RS256 assertion signed with the service
//! account key is posted to the token endpoint, which answers with a
//! short-lived access token.

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{IdentityError, Result};
use crate::issuer::ServiceAccount;
use crate::types::BearerCredential;

/// Token endpoint used when the key file names none
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Scope granting read/write access to the document store
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// `grant_type` of the JWT-bearer flow
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Claims of the grant assertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

/// Obtains access tokens for a service account
#[derive(Debug, Clone)]
pub struct AccessTokenGrant {
    account: ServiceAccount,
    scope: String,
    token_uri: String,
    http_client: reqwest::Client,
}

impl AccessTokenGrant {
    /// Grant against the account's `token_uri`, or [`DEFAULT_TOKEN_URI`]
    pub fn new(account: ServiceAccount, http_client: reqwest::Client) -> Self {
        let token_uri = account.token_uri().unwrap_or(DEFAULT_TOKEN_URI).to_string();
        Self {
            account,
            scope: DATASTORE_SCOPE.to_string(),
            token_uri,
            http_client,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    /// Claims for an assertion valid for one hour from now
    pub fn claims(&self) -> GrantClaims {
        let now = Utc::now();
        GrantClaims {
            iss: self.account.client_email().to_string(),
            scope: self.scope.clone(),
            aud: self.token_uri.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        }
    }

    /// Sign the grant assertion
    pub fn assertion(&self) -> Result<String> {
        Ok(encode(
            &Header::new(Algorithm::RS256),
            &self.claims(),
            &self.account.key,
        )?)
    }

    /// Trade a fresh assertion for an access token
    pub async fn fetch(&self) -> Result<BearerCredential> {
        let assertion = self.assertion()?;
        debug!(
            token_uri = %self.token_uri,
            account = %self.account.client_email(),
            "Requesting access token"
        );

        let response = self
            .http_client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Access token grant rejected");
            return Err(IdentityError::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: TokenResponse = serde_json::from_str(&body).unwrap_or_else(|e| {
            debug!(error = %e, "Grant response is not a token payload");
            TokenResponse::default()
        });

        let token = parsed
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(IdentityError::CredentialMissing)?;

        let mut credential = BearerCredential::new(token);
        if let Some(secs) = parsed.expires_in {
            credential = credential.with_expires_in(secs);
        }

        info!(
            credential = %credential,
            expires_at = ?credential.expires_at(),
            "Received access token"
        );

        Ok(credential)
    }
}
