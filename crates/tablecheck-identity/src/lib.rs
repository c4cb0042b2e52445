//! Identity Issuance and Credential Exchange
//!
//! Obtains the short-lived bearer credential a verification run presents to
//! the document store:
//!
//! 1. An [`AssertionIssuer`] mints a custom token for a fresh subject id
//!    carrying custom claims (e.g. `{"role": "staff"}`)
//! 2. A [`CredentialExchanger`] trades that token at the identity provider
//!    for an ID token used as a bearer credential
//!
//! ## Usage
//!
//! ```ignore
//! use tablecheck_identity::{ClaimSet, CustomTokenIssuer, IdentityToolkitExchanger, SubjectId};
//!
//! let issuer = CustomTokenIssuer::emulator();
//! let subject = SubjectId::timestamped("staff-tester");
//! let assertion = issuer.issue(&subject, &ClaimSet::role("staff"))?;
//!
//! let exchanger = IdentityToolkitExchanger::new("http://127.0.0.1:9099", "fake", client);
//! let credential = exchanger.exchange(&assertion).await?;
//! println!("Received idToken: {}", credential);
//! ```
//!
//! ## Signing identities
//!
//! Against the auth emulator, custom tokens are unsigned (`alg: none`). With
//! a service account, tokens are RS256-signed with the account's private key.
//!
//! ## Service access tokens
//!
//! [`AccessTokenGrant`] trades a service-account signed JWT for an OAuth2
//! access token, used to write to the production document store.

pub mod error;
pub mod exchanger;
pub mod issuer;
pub mod oauth;
pub mod token_file;
pub mod types;

pub use error::{IdentityError, Result};
pub use exchanger::{CredentialExchanger, IdentityToolkitExchanger};
pub use issuer::{
    AssertionIssuer, CustomTokenClaims, CustomTokenIssuer, ServiceAccount, SigningIdentity,
};
pub use oauth::{AccessTokenGrant, GrantClaims};
pub use token_file::TokenFile;
pub use types::{Assertion, BearerCredential, ClaimSet, SubjectId};
