//! Custom-Token Issuer
//!
//! Mints the identity assertion (a custom token) for a subject id and a set
//! of custom claims. The token is only meaningful to the identity provider,
//! which trades it for an ID token.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::error::{IdentityError, Result};
use crate::types::{Assertion, ClaimSet, SubjectId};

/// Audience every custom token is addressed to
pub const CUSTOM_TOKEN_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// Account the auth emulator expects on unsigned tokens
pub const EMULATOR_ACCOUNT: &str = "firebase-auth-emulator@example.com";

/// Longest subject id the provider accepts
pub const MAX_SUBJECT_LEN: usize = 128;

/// Claim names the provider reserves for itself
pub const RESERVED_CLAIMS: &[&str] = &[
    "acr", "amr", "at_hash", "aud", "auth_time", "azp", "cnf", "c_hash", "exp", "firebase",
    "iat", "iss", "jti", "nbf", "nonce", "sub",
];

/// Mints identity assertions
pub trait AssertionIssuer: Send + Sync {
    /// Issue an assertion for `subject` carrying `claims`
    fn issue(&self, subject: &SubjectId, claims: &ClaimSet) -> Result<Assertion>;

    /// Get a description of this issuer (for logging)
    fn description(&self) -> &str {
        "assertion issuer"
    }
}

/// Service account credentials used to sign custom tokens
#[derive(Clone)]
pub struct ServiceAccount {
    client_email: String,
    pub(crate) key: EncodingKey,
    token_uri: Option<String>,
    project_id: Option<String>,
}

#[derive(Deserialize)]
struct ServiceAccountFile {
    client_email: Option<String>,
    private_key: Option<String>,
    token_uri: Option<String>,
    project_id: Option<String>,
}

impl ServiceAccount {
    /// Build from an account email and a PEM-encoded RSA private key
    pub fn new(client_email: impl Into<String>, private_key_pem: &str) -> Result<Self> {
        let client_email = client_email.into();
        if client_email.is_empty() {
            return Err(IdentityError::Issuance("service account has no client_email".into()));
        }

        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes()).map_err(|e| {
            IdentityError::Issuance(format!("invalid service account private key: {}", e))
        })?;

        Ok(Self {
            client_email,
            key,
            token_uri: None,
            project_id: None,
        })
    }

    /// Use `token_uri` for OAuth2 access-token grants
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = Some(token_uri.into());
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Load a service account JSON key file (`client_email`, `private_key`)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            IdentityError::Issuance(format!(
                "cannot read service account {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: ServiceAccountFile = serde_json::from_str(&raw).map_err(|e| {
            IdentityError::Issuance(format!(
                "malformed service account {}: {}",
                path.display(),
                e
            ))
        })?;

        let client_email = file
            .client_email
            .ok_or_else(|| IdentityError::Issuance("service account has no client_email".into()))?;
        let private_key = file
            .private_key
            .ok_or_else(|| IdentityError::Issuance("service account has no private_key".into()))?;

        let mut account = Self::new(client_email, &private_key)?;
        account.token_uri = file.token_uri.filter(|uri| !uri.is_empty());
        account.project_id = file.project_id.filter(|id| !id.is_empty());
        Ok(account)
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Token endpoint named in the key file, if any
    pub fn token_uri(&self) -> Option<&str> {
        self.token_uri.as_deref()
    }

    /// Project the key file belongs to, if named
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

/// How custom tokens are signed
#[derive(Debug, Clone)]
pub enum SigningIdentity {
    /// Unsigned tokens accepted by the auth emulator
    Emulator,
    /// RS256 tokens signed with a service account key
    ServiceAccount(ServiceAccount),
}

impl SigningIdentity {
    /// Account written to `iss` and `sub`
    pub fn account(&self) -> &str {
        match self {
            SigningIdentity::Emulator => EMULATOR_ACCOUNT,
            SigningIdentity::ServiceAccount(sa) => sa.client_email(),
        }
    }
}

/// Claims of a custom token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomTokenClaims {
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub sub: String,
    pub uid: String,
    #[serde(default, skip_serializing_if = "ClaimSet::is_empty")]
    pub claims: ClaimSet,
}

/// Issues custom tokens
#[derive(Debug, Clone)]
pub struct CustomTokenIssuer {
    identity: SigningIdentity,
    ttl: Duration,
}

impl CustomTokenIssuer {
    pub fn new(identity: SigningIdentity) -> Self {
        Self {
            identity,
            ttl: Duration::hours(1),
        }
    }

    /// Issuer producing unsigned emulator tokens
    pub fn emulator() -> Self {
        Self::new(SigningIdentity::Emulator)
    }

    /// Issuer signing with the service account key file at `path`
    pub fn from_service_account_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(SigningIdentity::ServiceAccount(
            ServiceAccount::from_file(path)?,
        )))
    }

    pub fn identity(&self) -> &SigningIdentity {
        &self.identity
    }

    /// Build the claims for a token, validating subject and custom claims
    pub fn claims_for(&self, subject: &SubjectId, claims: &ClaimSet) -> Result<CustomTokenClaims> {
        let uid = subject.as_str();
        if uid.is_empty() || uid.len() > MAX_SUBJECT_LEN {
            return Err(IdentityError::Issuance(format!(
                "subject id must be 1..={} characters, got {}",
                MAX_SUBJECT_LEN,
                uid.len()
            )));
        }

        if let Some(reserved) = claims.keys().find(|k| RESERVED_CLAIMS.contains(k)) {
            return Err(IdentityError::Issuance(format!(
                "claim '{}' is reserved and cannot be set",
                reserved
            )));
        }

        let now = Utc::now();
        let account = self.identity.account().to_string();

        Ok(CustomTokenClaims {
            aud: CUSTOM_TOKEN_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            iss: account.clone(),
            sub: account,
            uid: uid.to_string(),
            claims: claims.clone(),
        })
    }
}

impl AssertionIssuer for CustomTokenIssuer {
    fn issue(&self, subject: &SubjectId, claims: &ClaimSet) -> Result<Assertion> {
        let token_claims = self.claims_for(subject, claims)?;

        let token = match &self.identity {
            SigningIdentity::Emulator => encode_unsigned(&token_claims)?,
            SigningIdentity::ServiceAccount(sa) => {
                encode(&Header::new(Algorithm::RS256), &token_claims, &sa.key)?
            }
        };

        debug!(
            uid = %token_claims.uid,
            issuer = %token_claims.iss,
            "Issued custom token"
        );

        Ok(Assertion::new(token))
    }

    fn description(&self) -> &str {
        match self.identity {
            SigningIdentity::Emulator => "unsigned emulator custom-token issuer",
            SigningIdentity::ServiceAccount(_) => "RS256 service-account custom-token issuer",
        }
    }
}

/// `alg: none` JWT with an empty signature segment
fn encode_unsigned(claims: &CustomTokenClaims) -> Result<String> {
    let header = serde_json::json!({ "alg": "none", "typ": "JWT" });
    let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    Ok(format!("{}.{}.", header, payload))
}
