//! Seed Loader Tests

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tablecheck_core::FieldValue;
use tablecheck_verifier::{
    MemoryDocumentStore, RestDocumentStore, SeedError, SeedFile, SeedLoader, SeedTarget,
};

const TEST_KEY: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../tablecheck-identity/tests/fixtures/test_key.pem"
);

fn write_seed(dir: &tempfile::TempDir, value: serde_json::Value) -> std::path::PathBuf {
    let path = dir.path().join("seed_data.json");
    std::fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
    path
}

#[tokio::test]
async fn test_seed_into_policy_store_as_owner() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_seed(
        &dir,
        json!({
            "macrocategorie": [
                {"name": "Cibo", "order": 1},
                {"name": "Bevande", "order": 2}
            ],
            "sottocategorie": [
                {"name": "Pizze", "macro": "Cibo", "tags": ["forno", "veg"]}
            ]
        }),
    );

    let store = MemoryDocumentStore::new("demo-no-project");
    store.grant_admin("owner");

    let seed = SeedFile::load(&path).unwrap();
    let created = SeedLoader::new(&store).load(&seed).await.unwrap();

    assert_eq!(created.len(), 3);
    assert_eq!(created[0].collection, "macrocategorie");
    assert_eq!(created[2].collection, "sottocategorie");
    assert_eq!(store.paths_in("macrocategorie").len(), 2);

    let pizze = store.get(&created[2]).unwrap();
    assert_eq!(pizze.get("name"), Some(&FieldValue::from("Pizze")));
    assert!(matches!(pizze.get("tags"), Some(FieldValue::Array(_))));
}

#[tokio::test]
async fn test_seed_without_owner_is_rejected() {
    let store = MemoryDocumentStore::new("demo-no-project");
    let seed = SeedFile::from_json(json!({"macrocategorie": [{"name": "Cibo"}]})).unwrap();

    let err = SeedLoader::new(&store).load(&seed).await.unwrap_err();

    match err {
        SeedError::Rejected {
            collection,
            index,
            status,
            ..
        } => {
            assert_eq!(collection, "macrocategorie");
            assert_eq!(index, 0);
            assert_eq!(status, 403);
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_seed_over_rest_uses_owner_bearer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(
            "/v1/projects/demo-no-project/databases/(default)/documents/macrocategorie",
        ))
        .and(header("authorization", "Bearer owner"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/demo-no-project/databases/(default)/documents/macrocategorie/m1",
            "fields": {"name": {"stringValue": "Cibo"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = RestDocumentStore::new(&server.uri(), "demo-no-project", reqwest::Client::new());
    let seed = SeedFile::from_json(json!({"macrocategorie": [{"name": "Cibo"}]})).unwrap();

    let created = SeedLoader::new(&store).load(&seed).await.unwrap();

    assert_eq!(created.len(), 1);
    assert_eq!(created[0].id, "m1");
}

#[tokio::test]
async fn test_seed_stops_at_first_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "status": "INVALID_ARGUMENT"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = RestDocumentStore::new(&server.uri(), "demo-no-project", reqwest::Client::new());
    let seed = SeedFile::from_json(json!({
        "macrocategorie": [{"name": "Cibo"}, {"name": "Bevande"}]
    }))
    .unwrap();

    let err = SeedLoader::new(&store).load(&seed).await.unwrap_err();

    assert!(matches!(err, SeedError::Rejected { status: 400, .. }));
}

#[tokio::test]
async fn test_seed_with_service_account_access_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.seed-access",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(
            "/v1/projects/restaurant-prod/databases/(default)/documents/macrocategorie",
        ))
        .and(header("authorization", "Bearer ya29.seed-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/restaurant-prod/databases/(default)/documents/macrocategorie/m1",
            "fields": {"name": {"stringValue": "Cibo"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let key_file = dir.path().join("serviceAccountKey.json");
    let key = json!({
        "type": "service_account",
        "project_id": "restaurant-prod",
        "client_email": "seeder@restaurant-prod.iam.gserviceaccount.com",
        "private_key": std::fs::read_to_string(TEST_KEY).unwrap(),
        "token_uri": format!("{}/token", server.uri())
    });
    std::fs::write(&key_file, key.to_string()).unwrap();

    let client = reqwest::Client::new();
    let target = SeedTarget::service_account(&key_file, "demo-no-project", &server.uri(), &client)
        .await
        .unwrap();
    assert_eq!(target.project_id, "restaurant-prod");

    let store = RestDocumentStore::new(&target.base_url, &target.project_id, client);
    let seed = SeedFile::from_json(json!({"macrocategorie": [{"name": "Cibo"}]})).unwrap();
    let created = SeedLoader::with_credential(&store, target.credential)
        .load(&seed)
        .await
        .unwrap();

    assert_eq!(created.len(), 1);
    assert_eq!(created[0].id, "m1");
}

#[tokio::test]
async fn test_refused_grant_is_credential_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let key_file = dir.path().join("serviceAccountKey.json");
    let key = json!({
        "client_email": "seeder@restaurant-prod.iam.gserviceaccount.com",
        "private_key": std::fs::read_to_string(TEST_KEY).unwrap(),
        "token_uri": format!("{}/token", server.uri())
    });
    std::fs::write(&key_file, key.to_string()).unwrap();

    let result = SeedTarget::service_account(
        &key_file,
        "demo-no-project",
        &server.uri(),
        &reqwest::Client::new(),
    )
    .await;

    assert!(matches!(result, Err(SeedError::Credential(msg)) if msg.contains("invalid_grant")));
}
