//! Seed Loader
//!
//! Creates every entry of the seed file as a new document, bypassing the
//! access policy. Writes to the emulator when FIRESTORE_EMULATOR_HOST is set,
//! otherwise to the production store with the service account key.

use std::process::ExitCode;
use tracing::{error, info};

use tablecheck_verifier::{
    telemetry, RestDocumentStore, SeedFile, SeedLoader, SeedMode, SeedTarget, VerifierConfig,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    telemetry::init_from_env();

    let config = match VerifierConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("FAILED: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let http_client = match config.http_client() {
        Ok(client) => client,
        Err(err) => {
            eprintln!("FAILED: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let seed = match SeedFile::load(&config.seed_file) {
        Ok(seed) => seed,
        Err(err) => {
            error!(error = %err, "Cannot load seed file");
            eprintln!("FAILED: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let mode = SeedMode::from_config(&config);
    let target = match SeedTarget::resolve(&mode, &config, &http_client).await {
        Ok(target) => target,
        Err(err) => {
            error!(error = %err, ?mode, "Cannot resolve seed target");
            eprintln!("FAILED: {}", err);
            return ExitCode::FAILURE;
        }
    };

    info!(
        path = %config.seed_file.display(),
        entries = seed.len(),
        store = %target.base_url,
        project = %target.project_id,
        ?mode,
        "Loading seed data"
    );

    let store = RestDocumentStore::new(&target.base_url, &target.project_id, http_client);
    match SeedLoader::with_credential(&store, target.credential).load(&seed).await {
        Ok(created) => {
            for path in &created {
                println!("{}", path);
            }
            println!("Seeded {} documents", created.len());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "Seeding failed");
            eprintln!("FAILED: {}", err);
            if let tablecheck_verifier::SeedError::Rejected { body, .. } = &err {
                eprintln!("response body: {}", body);
            }
            ExitCode::FAILURE
        }
    }
}
