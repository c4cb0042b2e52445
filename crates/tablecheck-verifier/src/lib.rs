//! Session Access-Policy Verifier
//!
//! Exercises a document store's access policy for table sessions end to end
//! and reports whether the observed authorization outcomes match the
//! expected ones:
//!
//! 1. Issue a custom token for a fresh `staff-tester-<millis>` subject with
//!    `{"role": "staff"}` and exchange it for a bearer credential
//! 2. Run the session lifecycle protocol against the store
//! 3. Fail on the first deviation, transport error or content mismatch
//!
//! ## Components
//!
//! - [`VerifierConfig`] - explicit configuration, read once by the binaries
//! - [`DocumentStore`] - create/read/patch seam with a REST implementation and
//!   an in-memory store enforcing the policy model
//! - [`StepRunner`] - interprets protocol steps against a store
//! - [`Verifier`] - credential acquisition plus one protocol run
//! - [`SeedLoader`] - bulk fixture loading with the administrative bearer

pub mod config;
pub mod error;
pub mod runner;
pub mod seed;
pub mod store;
pub mod telemetry;
pub mod verifier;

pub use config::{ConfigError, VerifierConfig};
pub use error::{Result, VerifyError};
pub use runner::{RunReport, StepObserver, StepReport, StepRunner};
pub use seed::{SeedError, SeedFile, SeedLoader, SeedMode, SeedTarget};
pub use store::{
    DocumentStore, MemoryDocumentStore, RestDocumentStore, StoreError, StoreResponse,
};
pub use verifier::{acquire_credential, CredentialState, Verifier};
