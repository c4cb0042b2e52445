//! End-to-End Verification Tests
//!
//! One wiremock server plays both the identity provider and the document
//! store. The store side keeps the written fields so reads reflect writes.

use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Match, Mock, MockServer, Request, Respond, ResponseTemplate};

use tablecheck_core::Outcome;
use tablecheck_identity::{ClaimSet, IdentityToolkitExchanger, SubjectId, TokenFile};
use tablecheck_verifier::{acquire_credential, Verifier, VerifierConfig, VerifyError};

// =============================================================================
// Test Helpers
// =============================================================================

const SIGN_IN: &str = "/identitytoolkit.googleapis.com/v1/accounts:signInWithCustomToken";
const SESSIONS: &str = "/v1/projects/demo-no-project/databases/(default)/documents/sessions";
const DOCUMENT_NAME: &str =
    "projects/demo-no-project/databases/(default)/documents/sessions/e2e-doc";
const ID_TOKEN: &str = "e2e-id-token";

struct NoAuthorization;

impl Match for NoAuthorization {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("authorization")
    }
}

/// Fields of the single document the fake store holds
#[derive(Clone, Default)]
struct StoredFields(Arc<Mutex<Map<String, Value>>>);

impl StoredFields {
    fn document(&self) -> Value {
        let fields = self.0.lock().unwrap().clone();
        json!({"name": DOCUMENT_NAME, "fields": fields})
    }

    fn merge(&self, request: &Request) {
        let body: Value = request.body_json().unwrap_or(Value::Null);
        if let Some(fields) = body.get("fields").and_then(Value::as_object) {
            let mut stored = self.0.lock().unwrap();
            for (name, value) in fields {
                stored.insert(name.clone(), value.clone());
            }
        }
    }
}

/// Stores the request's fields and answers with the document
struct WriteDocument(StoredFields);

impl Respond for WriteDocument {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.0.merge(request);
        ResponseTemplate::new(200).set_body_json(self.0.document())
    }
}

/// Answers with the stored document
struct ReadDocument(StoredFields);

impl Respond for ReadDocument {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(self.0.document())
    }
}

fn forbidden() -> ResponseTemplate {
    ResponseTemplate::new(403).set_body_json(json!({
        "error": {
            "code": 403,
            "message": "Missing or insufficient permissions.",
            "status": "PERMISSION_DENIED"
        }
    }))
}

fn config_for(server: &MockServer) -> VerifierConfig {
    VerifierConfig {
        auth_host: server.uri(),
        store_host: server.uri(),
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

async fn mount_exchange(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(SIGN_IN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "idToken": ID_TOKEN,
            "refreshToken": "e2e-refresh",
            "expiresIn": "3600"
        })))
        .mount(server)
        .await;
}

/// A store that enforces the session policy for the e2e bearer
async fn mount_conforming_store(server: &MockServer) {
    let stored = StoredFields::default();
    let bearer = format!("Bearer {}", ID_TOKEN);

    Mock::given(method("POST"))
        .and(path(SESSIONS))
        .and(NoAuthorization)
        .respond_with(forbidden())
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(SESSIONS))
        .and(header("authorization", bearer.as_str()))
        .respond_with(WriteDocument(stored.clone()))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/e2e-doc", SESSIONS)))
        .and(header("authorization", bearer.as_str()))
        .respond_with(ReadDocument(stored.clone()))
        .up_to_n_times(1)
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("PATCH"))
        .and(path(format!("{}/e2e-doc", SESSIONS)))
        .and(header("authorization", bearer.as_str()))
        .respond_with(WriteDocument(stored))
        .expect(1)
        .mount(server)
        .await;

    // Once ended, reads are refused
    Mock::given(method("GET"))
        .and(path(format!("{}/e2e-doc", SESSIONS)))
        .respond_with(forbidden())
        .expect(1)
        .mount(server)
        .await;
}

// =============================================================================
// Full Runs
// =============================================================================

#[tokio::test]
async fn test_full_run_passes() {
    let server = MockServer::start().await;
    mount_exchange(&server).await;
    mount_conforming_store(&server).await;

    let verifier = Verifier::from_config(&config_for(&server)).unwrap();
    let report = verifier.run().await.unwrap();

    let observed: Vec<Outcome> = report.steps.iter().map(|s| s.observed).collect();
    assert_eq!(
        observed,
        vec![
            Outcome::Rejected(403),
            Outcome::Accepted,
            Outcome::Accepted,
            Outcome::Accepted,
            Outcome::Rejected(403),
        ]
    );
    assert_eq!(report.document.unwrap().id, "e2e-doc");
    assert!(report.subject.unwrap().starts_with("staff-tester-"));
}

#[tokio::test]
async fn test_missing_id_token_stops_before_store() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SIGN_IN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "noop"})))
        .mount(&server)
        .await;

    Mock::given(path_regex("^/v1/projects/.*"))
        .respond_with(forbidden())
        .expect(0)
        .mount(&server)
        .await;

    let verifier = Verifier::from_config(&config_for(&server)).unwrap();
    let err = verifier.run().await.unwrap_err();

    assert!(matches!(err, VerifyError::CredentialMissing));
}

#[tokio::test]
async fn test_open_store_fails_at_first_step() {
    let server = MockServer::start().await;
    mount_exchange(&server).await;

    Mock::given(method("POST"))
        .and(path(SESSIONS))
        .and(NoAuthorization)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": DOCUMENT_NAME,
            "fields": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Nothing after the first deviation is sent
    Mock::given(header("authorization", format!("Bearer {}", ID_TOKEN).as_str()))
        .respond_with(forbidden())
        .expect(0)
        .mount(&server)
        .await;

    let verifier = Verifier::from_config(&config_for(&server)).unwrap();
    let err = verifier.run().await.unwrap_err();

    assert!(err.is_security_failure());
    assert_eq!(err.kind(), "AuthorizationDeviation");
    assert_eq!(err.response_body().unwrap()["name"], DOCUMENT_NAME);
}

// =============================================================================
// Token Minting
// =============================================================================

#[tokio::test]
async fn test_minted_token_file() {
    let server = MockServer::start().await;
    mount_exchange(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = VerifierConfig {
        token_file: dir.path().join("token.json"),
        ..config_for(&server)
    };

    let exchanger = IdentityToolkitExchanger::new(
        &config.auth_base_url(),
        &config.api_key,
        config.http_client().unwrap(),
    );
    let credential = acquire_credential(
        &config.issuer().unwrap(),
        &exchanger,
        &SubjectId::timestamped("staff-token"),
        &ClaimSet::role("staff"),
    )
    .await
    .unwrap();

    TokenFile::from_credential(&credential)
        .write(&config.token_file)
        .unwrap();

    let written = TokenFile::read(&config.token_file).unwrap();
    assert_eq!(written.id_token, ID_TOKEN);
}
