//! Session Access-Policy Verifier Binary
//!
//! Runs the session lifecycle protocol once against the configured emulators
//! and exits 0 when every step matched its expectation, 1 otherwise.

use std::process::ExitCode;
use tracing::{error, info};

use tablecheck_verifier::{telemetry, Verifier, VerifierConfig, VerifyError};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    telemetry::init_from_env();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(kind = err.kind(), error = %err, "Verification failed");
            eprintln!("FAILED [{}]: {}", err.kind(), err);
            if let Some(body) = err.response_body() {
                eprintln!("response body: {}", body);
            }
            if err.is_security_failure() {
                eprintln!("the store granted a request its policy must deny");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), VerifyError> {
    let config = VerifierConfig::from_env()?;

    info!(
        project = %config.project_id,
        auth = %config.auth_base_url(),
        store = %config.store_base_url(),
        collection = %config.collection,
        timeout_secs = config.request_timeout.as_secs(),
        "Starting session access-policy verification"
    );

    // Steps print as they pass so a failing run still shows how far it got
    let verifier = Verifier::from_config(&config)?.on_step(|step| println!("{}", step));
    let report = verifier.run().await?;

    if let Some(subject) = &report.subject {
        println!("subject: {}", subject);
    }
    if let Some(document) = &report.document {
        println!("document: {}", document);
    }
    println!("PASSED: all {} steps matched the session access policy", report.steps.len());
    Ok(())
}
