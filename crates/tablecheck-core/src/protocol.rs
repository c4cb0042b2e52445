//! Declarative verification protocol
//!
//! A protocol is an ordered list of step descriptors. Each descriptor names
//! the document operation, whether the bearer credential is attached, and
//! the authorization outcome the store must produce. The descriptors carry
//! no execution logic; a runner interprets them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::policy::{allowed, Claims, DocumentState, Operation};

/// Status the store answers with when the policy denies a request
pub const FORBIDDEN: u16 = 403;

/// Session operation performed by a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOperation {
    /// Create the session document
    CreateSession,
    /// Read the session document back
    ReadSession,
    /// Patch `active = false` (and `expiresAt`) under an update mask
    EndSession,
}

impl StepOperation {
    /// Policy operation this step exercises
    pub fn operation(self) -> Operation {
        match self {
            StepOperation::CreateSession => Operation::Create,
            StepOperation::ReadSession => Operation::Read,
            StepOperation::EndSession => Operation::Patch,
        }
    }

    /// Session state after this step is accepted
    pub fn transition(self, state: DocumentState) -> DocumentState {
        match self {
            StepOperation::CreateSession => DocumentState::Active,
            StepOperation::ReadSession => state,
            StepOperation::EndSession => DocumentState::Ended,
        }
    }

    /// Whether the step addresses an existing document
    pub fn needs_document(self) -> bool {
        !matches!(self, StepOperation::CreateSession)
    }
}

impl fmt::Display for StepOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOperation::CreateSession => write!(f, "create session"),
            StepOperation::ReadSession => write!(f, "read session"),
            StepOperation::EndSession => write!(f, "end session"),
        }
    }
}

/// Whether a step attaches the bearer credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialPresence {
    Anonymous,
    Bearer,
}

impl fmt::Display for CredentialPresence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialPresence::Anonymous => write!(f, "no credential"),
            CredentialPresence::Bearer => write!(f, "bearer credential"),
        }
    }
}

/// Expected authorization outcome of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "outcome")]
pub enum Expectation {
    /// A 2xx response
    Accept,
    /// A 4xx response with exactly this status
    Reject { status: u16 },
}

impl Expectation {
    pub fn forbidden() -> Self {
        Expectation::Reject { status: FORBIDDEN }
    }

    /// Whether an observed status class satisfies this expectation
    pub fn is_met_by(&self, class: StatusClass) -> bool {
        match (self, class) {
            (Expectation::Accept, StatusClass::Success(_)) => true,
            (Expectation::Reject { status }, StatusClass::Rejection(observed)) => {
                *status == observed
            }
            _ => false,
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Accept => write!(f, "success (2xx)"),
            Expectation::Reject { status } => write!(f, "rejection ({})", status),
        }
    }
}

/// Classification of an HTTP status for authorization checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// 2xx
    Success(u16),
    /// 4xx, the store answered and refused
    Rejection(u16),
    /// Anything else; not an authorization answer
    Transport(u16),
}

impl StatusClass {
    pub fn of(status: u16) -> Self {
        match status {
            200..=299 => StatusClass::Success(status),
            400..=499 => StatusClass::Rejection(status),
            _ => StatusClass::Transport(status),
        }
    }

    pub fn status(self) -> u16 {
        match self {
            StatusClass::Success(s) | StatusClass::Rejection(s) | StatusClass::Transport(s) => s,
        }
    }

    /// Observed authorization outcome, if the status is one
    pub fn outcome(self) -> Option<Outcome> {
        match self {
            StatusClass::Success(_) => Some(Outcome::Accepted),
            StatusClass::Rejection(status) => Some(Outcome::Rejected(status)),
            StatusClass::Transport(_) => None,
        }
    }
}

/// Observed authorization outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Accepted,
    Rejected(u16),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Accepted => write!(f, "accepted"),
            Outcome::Rejected(status) => write!(f, "rejected ({})", status),
        }
    }
}

/// One step of the protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescriptor {
    /// Short label used in traces and errors
    pub name: String,
    pub operation: StepOperation,
    pub credential: CredentialPresence,
    pub expected: Expectation,
}

impl StepDescriptor {
    pub fn new(
        name: impl Into<String>,
        operation: StepOperation,
        credential: CredentialPresence,
        expected: Expectation,
    ) -> Self {
        Self {
            name: name.into(),
            operation,
            credential,
            expected,
        }
    }
}

/// An ordered, fixed sequence of steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    steps: Vec<StepDescriptor>,
}

impl Protocol {
    pub fn new(steps: Vec<StepDescriptor>) -> Result<Self> {
        if steps.is_empty() {
            return Err(CoreError::InvalidProtocol("protocol has no steps".into()));
        }
        Ok(Self { steps })
    }

    /// The session lifecycle check:
    ///
    /// 1. anonymous create is rejected
    /// 2. staff create succeeds
    /// 3. staff read of the active session succeeds
    /// 4. staff patch ending the session succeeds
    /// 5. staff read of the ended session is rejected
    pub fn session_lifecycle() -> Self {
        use CredentialPresence::{Anonymous, Bearer};
        use StepOperation::{CreateSession, EndSession, ReadSession};

        Self {
            steps: vec![
                StepDescriptor::new(
                    "create without credential",
                    CreateSession,
                    Anonymous,
                    Expectation::forbidden(),
                ),
                StepDescriptor::new(
                    "create with credential",
                    CreateSession,
                    Bearer,
                    Expectation::Accept,
                ),
                StepDescriptor::new(
                    "read active session",
                    ReadSession,
                    Bearer,
                    Expectation::Accept,
                ),
                StepDescriptor::new("end session", EndSession, Bearer, Expectation::Accept),
                StepDescriptor::new(
                    "read ended session",
                    ReadSession,
                    Bearer,
                    Expectation::forbidden(),
                ),
            ],
        }
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Expectations implied by the policy model for a credential holding `claims`
    ///
    /// Walks the steps from `NotCreated`, advancing the session state only on
    /// steps the policy accepts.
    pub fn expected_by_policy(&self, claims: &Claims) -> Vec<Expectation> {
        let mut state = DocumentState::NotCreated;

        self.steps
            .iter()
            .map(|step| {
                let presented = match step.credential {
                    CredentialPresence::Anonymous => None,
                    CredentialPresence::Bearer => Some(claims),
                };

                if allowed(step.operation.operation(), presented, state) {
                    state = step.operation.transition(state);
                    Expectation::Accept
                } else {
                    Expectation::forbidden()
                }
            })
            .collect()
    }

    /// Fail if any declared expectation disagrees with the policy model
    pub fn check_against_policy(&self, claims: &Claims) -> Result<()> {
        let derived = self.expected_by_policy(claims);

        for (step, expected) in self.steps.iter().zip(derived) {
            if step.expected != expected {
                return Err(CoreError::InvalidProtocol(format!(
                    "step '{}' declares {} but the policy implies {}",
                    step.name, step.expected, expected
                )));
            }
        }
        Ok(())
    }
}
