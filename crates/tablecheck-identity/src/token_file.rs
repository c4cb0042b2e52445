//! Persisted credential file for manual use

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::types::BearerCredential;

/// `{"idToken": "..."}` written by the token minter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFile {
    #[serde(rename = "idToken")]
    pub id_token: String,
}

impl TokenFile {
    pub fn from_credential(credential: &BearerCredential) -> Self {
        Self {
            id_token: credential.token().to_string(),
        }
    }

    /// Write as pretty-printed JSON, replacing any existing file
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
