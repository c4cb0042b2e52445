//! Error types for identity issuance and exchange

use thiserror::Error;

/// Result type for identity operations
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Errors that can occur while obtaining a credential
#[derive(Error, Debug)]
pub enum IdentityError {
    /// The assertion could not be minted (signing identity or input invalid)
    #[error("Issuance failed: {0}")]
    Issuance(String),

    /// The provider answered the exchange with a non-success status
    #[error("Credential exchange failed: HTTP {status}: {body}")]
    Exchange { status: u16, body: String },

    /// The exchange succeeded but carried no usable credential
    #[error("Credential exchange returned no usable idToken")]
    CredentialMissing,

    /// No response was obtained from the provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// Token file could not be read or written
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON encoding/decoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<jsonwebtoken::errors::Error> for IdentityError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        IdentityError::Issuance(err.to_string())
    }
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        IdentityError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for IdentityError {
    fn from(err: serde_json::Error) -> Self {
        IdentityError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for IdentityError {
    fn from(err: std::io::Error) -> Self {
        IdentityError::Io(err.to_string())
    }
}
