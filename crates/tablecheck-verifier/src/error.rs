//! Error types for verification runs
//!
//! Every failure a run can end in maps to exactly one variant; the first
//! failure ends the run.

use serde_json::Value;
use thiserror::Error;

use tablecheck_core::{CoreError, Expectation, Outcome};
use tablecheck_identity::IdentityError;

use crate::config::ConfigError;

/// Result type for verifier operations
pub type Result<T> = std::result::Result<T, VerifyError>;

/// Verification failures
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Issuance error: {0}")]
    Issuance(String),

    #[error("Credential exchange failed with status {status}")]
    Exchange { status: u16, body: String },

    #[error("Credential exchange succeeded without an idToken")]
    CredentialMissing,

    #[error("Transport error at {step}: {message}")]
    Transport {
        step: String,
        message: String,
        status: Option<u16>,
        body: Option<Value>,
    },

    #[error("Authorization deviation at {step}: expected {expected}, observed {observed}")]
    AuthorizationDeviation {
        step: String,
        expected: Expectation,
        observed: Outcome,
        body: Value,
    },

    #[error("Assertion failed at {step}: {message}")]
    Assertion {
        step: String,
        message: String,
        body: Value,
    },

    #[error("Invalid protocol: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl VerifyError {
    /// Stable name of the failure class, for the final verdict line
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyError::Config(_) => "ConfigError",
            VerifyError::Issuance(_) => "IssuanceError",
            VerifyError::Exchange { .. } => "ExchangeError",
            VerifyError::CredentialMissing => "CredentialMissing",
            VerifyError::Transport { .. } => "TransportError",
            VerifyError::AuthorizationDeviation { .. } => "AuthorizationDeviation",
            VerifyError::Assertion { .. } => "AssertionError",
            VerifyError::Protocol(_) => "ProtocolError",
            VerifyError::Io(_) => "IoError",
        }
    }

    /// Response body carried for diagnostics, if any
    pub fn response_body(&self) -> Option<Value> {
        match self {
            VerifyError::Exchange { body, .. } => Some(
                serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.clone())),
            ),
            VerifyError::Transport { body, .. } => body.clone(),
            VerifyError::AuthorizationDeviation { body, .. }
            | VerifyError::Assertion { body, .. } => Some(body.clone()),
            _ => None,
        }
    }

    /// Whether the store granted something the policy forbids
    pub fn is_security_failure(&self) -> bool {
        matches!(
            self,
            VerifyError::AuthorizationDeviation {
                expected: Expectation::Reject { .. },
                observed: Outcome::Accepted,
                ..
            }
        )
    }
}

impl From<IdentityError> for VerifyError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Issuance(msg) => VerifyError::Issuance(msg),
            IdentityError::Exchange { status, body } => VerifyError::Exchange { status, body },
            IdentityError::CredentialMissing => VerifyError::CredentialMissing,
            IdentityError::Transport(message) => VerifyError::Transport {
                step: "credential exchange".into(),
                message,
                status: None,
                body: None,
            },
            IdentityError::Io(msg) => VerifyError::Io(msg),
            IdentityError::Serialization(msg) => VerifyError::Io(msg),
        }
    }
}

impl From<CoreError> for VerifyError {
    fn from(err: CoreError) -> Self {
        VerifyError::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_errors_map_one_to_one() {
        assert!(matches!(
            VerifyError::from(IdentityError::Issuance("bad key".into())),
            VerifyError::Issuance(_)
        ));
        assert!(matches!(
            VerifyError::from(IdentityError::CredentialMissing),
            VerifyError::CredentialMissing
        ));
        assert!(matches!(
            VerifyError::from(IdentityError::Transport("refused".into())),
            VerifyError::Transport { status: None, .. }
        ));
    }

    #[test]
    fn test_exchange_body_for_diagnostics() {
        let err = VerifyError::Exchange {
            status: 400,
            body: r#"{"error":{"message":"INVALID_CUSTOM_TOKEN"}}"#.into(),
        };
        assert_eq!(err.kind(), "ExchangeError");
        assert_eq!(
            err.response_body(),
            Some(json!({"error": {"message": "INVALID_CUSTOM_TOKEN"}}))
        );
    }

    #[test]
    fn test_security_failure() {
        let granted = VerifyError::AuthorizationDeviation {
            step: "step 1 (create without credential)".into(),
            expected: Expectation::forbidden(),
            observed: Outcome::Accepted,
            body: json!({"name": "projects/p/databases/(default)/documents/sessions/x"}),
        };
        let refused = VerifyError::AuthorizationDeviation {
            step: "step 2 (create with credential)".into(),
            expected: Expectation::Accept,
            observed: Outcome::Rejected(403),
            body: json!({}),
        };

        assert!(granted.is_security_failure());
        assert!(!refused.is_security_failure());
        assert_eq!(
            granted.to_string(),
            concat!(
                "Authorization deviation at step 1 (create without credential): ",
                "expected rejection (403), observed accepted"
            )
        );
    }
}
