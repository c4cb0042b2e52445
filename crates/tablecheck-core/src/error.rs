//! Error types for the core data model

use thiserror::Error;

/// Result type alias using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while building or decoding core values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A required field is absent from a document
    #[error("Missing field: {0}")]
    MissingField(String),

    /// A field is present but holds the wrong kind of value
    #[error("Field '{field}' has kind {actual}, expected {expected}")]
    FieldKind {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A resource name could not be split into collection and id
    #[error("Invalid document name: {0}")]
    InvalidDocumentName(String),

    /// A session could not be built
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// A protocol definition is unusable
    #[error("Invalid protocol: {0}")]
    InvalidProtocol(String),
}
