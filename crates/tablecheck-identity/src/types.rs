//! Core types for identity issuance and exchange

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Number of leading characters shown when a token is displayed
const DISPLAY_PREFIX_LEN: usize = 30;

/// Subject (uid) an assertion is issued for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// `<prefix>-<unix millis>`
    ///
    /// Unique across sequential runs; two runs in the same millisecond collide.
    pub fn timestamped(prefix: &str) -> Self {
        Self(format!("{}-{}", prefix, Utc::now().timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Custom claims embedded in an assertion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(BTreeMap<String, serde_json::Value>);

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A claim set holding only `{"role": <role>}`
    pub fn role(role: impl Into<String>) -> Self {
        Self::new().with("role", serde_json::Value::String(role.into()))
    }

    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.clone().into_iter().collect())
    }
}

/// A minted custom token, only good for exchange
#[derive(Clone, PartialEq, Eq)]
pub struct Assertion(String);

impl Assertion {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Assertion").field(&truncate(&self.0)).finish()
    }
}

/// Short-lived bearer credential obtained from the identity provider
#[derive(Clone, PartialEq, Eq)]
pub struct BearerCredential {
    token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl BearerCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Expire `secs` seconds from now
    ///
    /// A lifetime that does not fit a timestamp leaves the expiry unset.
    pub fn with_expires_in(self, secs: i64) -> Self {
        let expires_at = chrono::Duration::try_seconds(secs)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));

        match expires_at {
            Some(at) => self.with_expires_at(at),
            None => self,
        }
    }

    /// The raw token for an `Authorization: Bearer` header
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => exp < Utc::now(),
            None => false,
        }
    }
}

impl fmt::Display for BearerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&truncate(&self.token))
    }
}

impl fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerCredential")
            .field("token", &truncate(&self.token))
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn truncate(token: &str) -> String {
    match token.char_indices().nth(DISPLAY_PREFIX_LEN) {
        Some((idx, _)) => format!("{}...", &token[..idx]),
        None => token.to_string(),
    }
}
