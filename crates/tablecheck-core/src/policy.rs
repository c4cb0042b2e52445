//! Model of the store's session access policy
//!
//! The real policy is enforced remotely and only observed through HTTP
//! status codes. This predicate states what the store is expected to do, so
//! that step expectations and test doubles share one definition.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role claim value granting session access
pub const STAFF_ROLE: &str = "staff";

/// Document operation subject to the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Patch,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Patch => write!(f, "patch"),
        }
    }
}

/// Lifecycle state of the session under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    NotCreated,
    Active,
    Ended,
}

impl DocumentState {
    pub fn exists(self) -> bool {
        !matches!(self, DocumentState::NotCreated)
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentState::NotCreated => write!(f, "not-created"),
            DocumentState::Active => write!(f, "active"),
            DocumentState::Ended => write!(f, "ended"),
        }
    }
}

/// Claims carried by a bearer credential, as seen by the policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Claims {
    pub fn with_role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
        }
    }

    pub fn staff() -> Self {
        Self::with_role(STAFF_ROLE)
    }

    /// Extract the policy-relevant claims from a JSON claim object
    pub fn from_json(claims: &serde_json::Value) -> Self {
        Self {
            role: claims.get("role").and_then(|v| v.as_str()).map(String::from),
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role.as_deref() == Some(STAFF_ROLE)
    }
}

/// Whether the store should accept `operation` from a caller holding `claims`
/// (`None` for an anonymous request) against a session in `state`
pub fn allowed(operation: Operation, claims: Option<&Claims>, state: DocumentState) -> bool {
    let Some(claims) = claims else {
        return false;
    };

    if !claims.is_staff() {
        return false;
    }

    match operation {
        Operation::Create => state == DocumentState::NotCreated,
        Operation::Read => state == DocumentState::Active,
        Operation::Patch => state.exists(),
    }
}
