//! Staff Token Minter
//!
//! Issues a `role = staff` custom token for a fresh `staff-token-<millis>`
//! subject, exchanges it, and writes `{"idToken": "..."}` to the token file.

use std::process::ExitCode;
use tracing::{error, info};

use tablecheck_identity::{ClaimSet, IdentityToolkitExchanger, SubjectId, TokenFile};
use tablecheck_verifier::{acquire_credential, telemetry, VerifierConfig, VerifyError};

const SUBJECT_PREFIX: &str = "staff-token";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    telemetry::init_from_env();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(kind = err.kind(), error = %err, "Token minting failed");
            eprintln!("FAILED [{}]: {}", err.kind(), err);
            if let Some(body) = err.response_body() {
                eprintln!("response body: {}", body);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), VerifyError> {
    let config = VerifierConfig::from_env()?;
    let issuer = config.issuer()?;
    let exchanger = IdentityToolkitExchanger::new(
        &config.auth_base_url(),
        &config.api_key,
        config.http_client()?,
    );

    let subject = SubjectId::timestamped(SUBJECT_PREFIX);
    let credential = acquire_credential(
        &issuer,
        &exchanger,
        &subject,
        &ClaimSet::role(tablecheck_core::STAFF_ROLE),
    )
    .await?;

    TokenFile::from_credential(&credential).write(&config.token_file)?;

    info!(
        subject = %subject,
        credential = %credential,
        path = %config.token_file.display(),
        "Wrote token file"
    );
    println!("Received idToken: {}", credential);
    println!("Saved to {}", config.token_file.display());
    Ok(())
}
