//! # Tablecheck Core
//!
//! Data model and protocol definition for verifying a session-scoped
//! access-control policy enforced by a remote document store.
//!
//! ## Key Concepts
//!
//! - **Session**: the table-session document under test
//! - **FieldValue**: a kind-tagged document field (`stringValue`, `integerValue`, ...)
//! - **Policy model**: the pure predicate `allowed(operation, claims, state)` describing
//!   what the store is expected to accept
//! - **Protocol**: the fixed, ordered list of step descriptors interpreted by a runner
//!
//! ## Session Invariants
//!
//! 1. **Authenticated writes**: create and patch require `role = staff`
//! 2. **Visibility**: a session is readable only while `active = true`
//! 3. **Anonymous denial**: requests without a credential are always rejected

pub mod error;
pub mod policy;
pub mod protocol;
pub mod session;
pub mod value;

pub use error::{CoreError, Result};
pub use policy::{allowed, Claims, DocumentState, Operation, STAFF_ROLE};
pub use protocol::{
    CredentialPresence, Expectation, Outcome, Protocol, StatusClass, StepDescriptor,
    StepOperation,
};
pub use session::{DocumentPath, Session, SessionBuilder, SessionPatch};
pub use value::{Document, FieldValue, Fields};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
