//! Property-Based Tests for the Session Policy Model
//!
//! These tests check the session invariants over arbitrary inputs:
//! 1. ANONYMOUS DENIAL: no credential, no access
//! 2. STAFF ONLY: any role other than `staff` is denied
//! 3. ENDED IS FINAL: once a session is ended, no later read is accepted
//!
//! Uses proptest for property-based testing with arbitrary inputs.

use proptest::prelude::*;
use tablecheck_core::{
    allowed, Claims, CredentialPresence, DocumentState, Expectation, Operation, Protocol,
    StepDescriptor, StepOperation,
};

fn any_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Create),
        Just(Operation::Read),
        Just(Operation::Patch),
    ]
}

fn any_state() -> impl Strategy<Value = DocumentState> {
    prop_oneof![
        Just(DocumentState::NotCreated),
        Just(DocumentState::Active),
        Just(DocumentState::Ended),
    ]
}

fn any_step() -> impl Strategy<Value = StepDescriptor> {
    let operation = prop_oneof![
        Just(StepOperation::CreateSession),
        Just(StepOperation::ReadSession),
        Just(StepOperation::EndSession),
    ];
    let credential = prop_oneof![
        Just(CredentialPresence::Anonymous),
        Just(CredentialPresence::Bearer),
    ];

    (operation, credential).prop_map(|(operation, credential)| {
        StepDescriptor::new("generated", operation, credential, Expectation::Accept)
    })
}

// =============================================================================
// INVARIANT 1: ANONYMOUS DENIAL
// =============================================================================

proptest! {
    #[test]
    fn prop_anonymous_requests_always_denied(
        operation in any_operation(),
        state in any_state(),
    ) {
        prop_assert!(!allowed(operation, None, state));
    }
}

// =============================================================================
// INVARIANT 2: STAFF ONLY
// =============================================================================

proptest! {
    #[test]
    fn prop_non_staff_roles_denied(
        role in "[a-z]{1,12}",
        operation in any_operation(),
        state in any_state(),
    ) {
        prop_assume!(role != "staff");
        let claims = Claims::with_role(role);
        prop_assert!(!allowed(operation, Some(&claims), state));
    }
}

// =============================================================================
// INVARIANT 3: ENDED IS FINAL
// =============================================================================

proptest! {
    /// Whatever a staff credential does, a read after an accepted end is rejected
    #[test]
    fn prop_no_read_after_accepted_end(steps in prop::collection::vec(any_step(), 1..12)) {
        let protocol = Protocol::new(steps).unwrap();
        let expectations = protocol.expected_by_policy(&Claims::staff());

        let mut ended = false;
        for (step, expected) in protocol.steps().iter().zip(&expectations) {
            if ended && step.operation == StepOperation::ReadSession {
                prop_assert_eq!(*expected, Expectation::forbidden());
            }
            if step.operation == StepOperation::EndSession && *expected == Expectation::Accept {
                ended = true;
            }
        }
    }

    /// Anonymous steps never get an accepting expectation
    #[test]
    fn prop_anonymous_steps_expect_rejection(steps in prop::collection::vec(any_step(), 1..12)) {
        let protocol = Protocol::new(steps).unwrap();
        let expectations = protocol.expected_by_policy(&Claims::staff());

        for (step, expected) in protocol.steps().iter().zip(&expectations) {
            if step.credential == CredentialPresence::Anonymous {
                prop_assert_eq!(*expected, Expectation::forbidden());
            }
        }
    }

    /// At most one create is accepted per session
    #[test]
    fn prop_single_accepted_create(steps in prop::collection::vec(any_step(), 1..12)) {
        let protocol = Protocol::new(steps).unwrap();
        let expectations = protocol.expected_by_policy(&Claims::staff());

        let accepted_creates = protocol
            .steps()
            .iter()
            .zip(&expectations)
            .filter(|(step, expected)| {
                step.operation == StepOperation::CreateSession && **expected == Expectation::Accept
            })
            .count();

        prop_assert!(accepted_creates <= 1);
    }
}

#[test]
fn test_lifecycle_expectations_match_policy() {
    let protocol = Protocol::session_lifecycle();
    let declared: Vec<Expectation> = protocol.steps().iter().map(|s| s.expected).collect();

    assert_eq!(declared, protocol.expected_by_policy(&Claims::staff()));
}
