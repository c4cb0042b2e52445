//! Verification orchestrator
//!
//! A run moves the credential through three states:
//!
//! ```text
//! NoCredential --issue--> HasAssertion --exchange--> HasBearerCredential
//! ```
//!
//! and then hands the bearer credential to the [`StepRunner`]. Each run uses
//! a fresh subject id and creates its own document, so runs never share
//! state.

use std::fmt;
use tracing::{debug, info, warn};

use tablecheck_core::{Claims, Protocol, Session};
use tablecheck_identity::{
    AssertionIssuer, BearerCredential, ClaimSet, CredentialExchanger, CustomTokenIssuer,
    IdentityToolkitExchanger, SubjectId,
};

use crate::config::VerifierConfig;
use crate::error::{Result, VerifyError};
use crate::runner::{RunReport, StepReport, StepRunner};
use crate::store::{DocumentStore, RestDocumentStore};

/// Prefix of the per-run subject id
pub const SUBJECT_PREFIX: &str = "staff-tester";

/// Where a run is in obtaining its credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    NoCredential,
    HasAssertion,
    HasBearerCredential,
}

impl fmt::Display for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialState::NoCredential => write!(f, "no-credential"),
            CredentialState::HasAssertion => write!(f, "has-assertion"),
            CredentialState::HasBearerCredential => write!(f, "has-bearer-credential"),
        }
    }
}

/// Issue an assertion for `subject` and exchange it for a bearer credential
pub async fn acquire_credential<I, E>(
    issuer: &I,
    exchanger: &E,
    subject: &SubjectId,
    claims: &ClaimSet,
) -> Result<BearerCredential>
where
    I: AssertionIssuer + ?Sized,
    E: CredentialExchanger + ?Sized,
{
    debug!(state = %CredentialState::NoCredential, subject = %subject, "Issuing assertion");
    let assertion = issuer.issue(subject, claims)?;

    info!(
        state = %CredentialState::HasAssertion,
        issuer = issuer.description(),
        subject = %subject,
        "Issued custom token"
    );

    let credential = exchanger.exchange(&assertion).await?;
    if credential.is_expired() {
        warn!(
            expires_at = ?credential.expires_at(),
            has_refresh = credential.refresh_token().is_some(),
            "Exchanged credential is already expired"
        );
        return Err(VerifyError::CredentialMissing);
    }

    info!(
        state = %CredentialState::HasBearerCredential,
        exchanger = exchanger.description(),
        has_refresh = credential.refresh_token().is_some(),
        "Obtained bearer credential"
    );

    Ok(credential)
}

/// Runs a protocol end to end with freshly issued credentials
pub struct Verifier<I, E, S> {
    issuer: I,
    exchanger: E,
    store: S,
    collection: String,
    protocol: Protocol,
    claims: ClaimSet,
    observer: Option<Box<dyn Fn(&StepReport) + Send + Sync>>,
}

impl Verifier<CustomTokenIssuer, IdentityToolkitExchanger, RestDocumentStore> {
    /// Wire the real issuer, exchanger and REST store from configuration
    pub fn from_config(config: &VerifierConfig) -> Result<Self> {
        let http_client = config.http_client()?;
        let issuer = config.issuer()?;
        let exchanger = IdentityToolkitExchanger::new(
            &config.auth_base_url(),
            &config.api_key,
            http_client.clone(),
        );
        let store =
            RestDocumentStore::new(&config.store_base_url(), &config.project_id, http_client);

        Ok(Self::new(issuer, exchanger, store, config.collection.clone()))
    }
}

impl<I, E, S> Verifier<I, E, S>
where
    I: AssertionIssuer,
    E: CredentialExchanger,
    S: DocumentStore,
{
    /// Verifier for the session lifecycle with `role = staff` credentials
    pub fn new(issuer: I, exchanger: E, store: S, collection: impl Into<String>) -> Self {
        Self {
            issuer,
            exchanger,
            store,
            collection: collection.into(),
            protocol: Protocol::session_lifecycle(),
            claims: ClaimSet::role(tablecheck_core::STAFF_ROLE),
            observer: None,
        }
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_claims(mut self, claims: ClaimSet) -> Self {
        self.claims = claims;
        self
    }

    /// Call `observer` with each step as it passes
    pub fn on_step<F>(mut self, observer: F) -> Self
    where
        F: Fn(&StepReport) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute one run
    ///
    /// The declared expectations are first checked against the policy model
    /// for the configured claims; a disagreement fails before any request.
    pub async fn run(&self) -> Result<RunReport> {
        self.protocol
            .check_against_policy(&Claims::from_json(&self.claims.to_json()))?;

        let subject = SubjectId::timestamped(SUBJECT_PREFIX);
        let credential =
            acquire_credential(&self.issuer, &self.exchanger, &subject, &self.claims).await?;

        let session = Session::probe()?;
        let mut runner = StepRunner::new(&self.store, &credential, &self.collection);
        if let Some(observer) = self.observer.as_deref() {
            runner = runner.with_observer(observer);
        }
        let mut report = runner.run(&self.protocol, &session).await?;

        report.subject = Some(subject.to_string());
        Ok(report)
    }
}
