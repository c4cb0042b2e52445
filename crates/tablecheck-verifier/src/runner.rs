//! Step runner
//!
//! Interprets a [`Protocol`] against a [`DocumentStore`]: sends each step's
//! request with or without the bearer credential, classifies the answer,
//! compares it with the step's expectation and checks accepted responses for
//! content. The first failing step ends the run.

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use tablecheck_core::session::field;
use tablecheck_core::{
    CredentialPresence, DocumentPath, DocumentState, Expectation, Outcome, Protocol, Session,
    SessionPatch, StepDescriptor, StepOperation,
};
use tablecheck_identity::BearerCredential;

use crate::error::{Result, VerifyError};
use crate::store::{DocumentStore, StoreResponse};

/// What one step observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// 1-based position in the protocol
    pub index: usize,
    pub name: String,
    pub operation: StepOperation,
    pub credential: CredentialPresence,
    pub expected: Expectation,
    pub observed: Outcome,
    /// Session state after the step
    pub state: DocumentState,
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {} ({}) with {}: expected {}, observed {} -> session {}",
            self.index, self.name, self.credential, self.expected, self.observed, self.state
        )
    }
}

/// Trace of a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Subject the credential was issued for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Document created by the run
    pub document: Option<DocumentPath>,
    pub steps: Vec<StepReport>,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(subject) = &self.subject {
            writeln!(f, "subject: {}", subject)?;
        }
        if let Some(document) = &self.document {
            writeln!(f, "document: {}", document)?;
        }
        for step in &self.steps {
            writeln!(f, "{}", step)?;
        }
        Ok(())
    }
}

/// Mutable state threaded through the steps of one run
struct RunContext<'s> {
    session: &'s Session,
    document: Option<DocumentPath>,
    state: DocumentState,
}

impl RunContext<'_> {
    fn document_for(&self, step: &str) -> Result<&DocumentPath> {
        self.document.as_ref().ok_or_else(|| VerifyError::Assertion {
            step: step.to_string(),
            message: "no document identifier was captured by an earlier step".into(),
            body: serde_json::Value::Null,
        })
    }
}

/// Callback receiving each step as it passes
pub type StepObserver<'a> = &'a (dyn Fn(&StepReport) + Send + Sync);

/// Runs protocol steps against a store with one bearer credential
pub struct StepRunner<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    credential: &'a BearerCredential,
    collection: &'a str,
    observer: Option<StepObserver<'a>>,
}

impl<'a, S: DocumentStore + ?Sized> StepRunner<'a, S> {
    pub fn new(store: &'a S, credential: &'a BearerCredential, collection: &'a str) -> Self {
        Self {
            store,
            credential,
            collection,
            observer: None,
        }
    }

    /// Report each passed step to `observer` before the next is sent
    ///
    /// Steps that passed before a failure are otherwise only visible in the
    /// returned [`RunReport`], which a failing run does not produce.
    pub fn with_observer(mut self, observer: StepObserver<'a>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run every step in order, stopping at the first failure
    pub async fn run(&self, protocol: &Protocol, session: &Session) -> Result<RunReport> {
        let mut context = RunContext {
            session,
            document: None,
            state: DocumentState::NotCreated,
        };
        let mut steps = Vec::with_capacity(protocol.len());

        info!(
            store = self.store.description(),
            collection = self.collection,
            steps = protocol.len(),
            "Running protocol"
        );

        for (i, step) in protocol.steps().iter().enumerate() {
            let report = self.run_step(i + 1, step, &mut context).await?;
            info!(
                step = report.index,
                name = %report.name,
                observed = %report.observed,
                state = %report.state,
                "Step passed"
            );
            if let Some(observe) = self.observer {
                observe(&report);
            }
            steps.push(report);
        }

        Ok(RunReport {
            subject: None,
            document: context.document,
            steps,
        })
    }

    async fn run_step(
        &self,
        index: usize,
        step: &StepDescriptor,
        context: &mut RunContext<'_>,
    ) -> Result<StepReport> {
        let label = format!("step {} ({})", index, step.name);
        let credential = match step.credential {
            CredentialPresence::Anonymous => None,
            CredentialPresence::Bearer => Some(self.credential),
        };

        let response = match step.operation {
            StepOperation::CreateSession => {
                self.store
                    .create(self.collection, &context.session.to_fields(), credential)
                    .await
            }
            StepOperation::ReadSession => {
                let path = context.document_for(&label)?;
                self.store.read(path, credential).await
            }
            StepOperation::EndSession => {
                let path = context.document_for(&label)?;
                let patch = SessionPatch::end(Utc::now());
                self.store
                    .patch(path, &patch.fields, &patch.mask, credential)
                    .await
            }
        }
        .map_err(|e| VerifyError::Transport {
            step: label.clone(),
            message: e.to_string(),
            status: None,
            body: None,
        })?;

        let class = response.class();
        let Some(observed) = class.outcome() else {
            return Err(VerifyError::Transport {
                step: label,
                message: format!("unexpected status {}", class.status()),
                status: Some(class.status()),
                body: Some(response.body),
            });
        };

        if !step.expected.is_met_by(class) {
            warn!(
                step = index,
                expected = %step.expected,
                observed = %observed,
                "Authorization deviation"
            );
            return Err(VerifyError::AuthorizationDeviation {
                step: label,
                expected: step.expected,
                observed,
                body: response.body,
            });
        }

        if observed == Outcome::Accepted {
            check_content(step.operation, &label, response, context)?;
            context.state = step.operation.transition(context.state);
        }

        Ok(StepReport {
            index,
            name: step.name.clone(),
            operation: step.operation,
            credential: step.credential,
            expected: step.expected,
            observed,
            state: context.state,
        })
    }
}

/// Content checks on an accepted response
fn check_content(
    operation: StepOperation,
    step: &str,
    response: StoreResponse,
    context: &mut RunContext<'_>,
) -> Result<()> {
    let fail = |message: String, body: serde_json::Value| VerifyError::Assertion {
        step: step.to_string(),
        message,
        body,
    };

    let Some(doc) = response.document() else {
        return Err(fail("response body is not a document".into(), response.body));
    };

    match operation {
        StepOperation::CreateSession => {
            let path = doc
                .name
                .as_deref()
                .and_then(|name| DocumentPath::from_name(name).ok());

            match path {
                Some(path) => {
                    info!(document = %path, "Captured document id");
                    context.document = Some(path);
                    Ok(())
                }
                None => Err(fail(
                    "response carries no document identifier".into(),
                    response.body,
                )),
            }
        }
        StepOperation::ReadSession => {
            let stored = match Session::from_document(&doc) {
                Ok(stored) => stored,
                Err(e) => return Err(fail(e.to_string(), response.body)),
            };
            if !stored.active {
                return Err(fail("session read back as inactive".into(), response.body));
            }

            let mismatches = context.session.mismatches(&doc);
            if !mismatches.is_empty() {
                return Err(fail(
                    format!("fields not reflected: {}", mismatches.join(", ")),
                    response.body,
                ));
            }
            Ok(())
        }
        StepOperation::EndSession => match doc.bool_field(field::ACTIVE) {
            Ok(false) => Ok(()),
            Ok(true) => Err(fail(
                "patched session still reports active".into(),
                response.body,
            )),
            Err(e) => Err(fail(e.to_string(), response.body)),
        },
    }
}
