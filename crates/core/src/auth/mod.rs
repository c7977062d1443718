pub mod token;

use crate::error::ConfigurationError;
use anyhow::Context;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

pub use token::ServiceAccountAuth;

pub const SCOPE_SPREADSHEETS: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const SCOPE_DRIVE: &str = "https://www.googleapis.com/auth/drive";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    FilePath(PathBuf),
    InlineJson(String),
}

/// Parsed service-account key. Opaque outside this module apart from the account email.
#[derive(Clone)]
pub struct Credential {
    key: ServiceAccountKey,
}

impl Credential {
    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    pub(crate) fn key(&self) -> &ServiceAccountKey {
        &self.key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("client_email", &self.key.client_email)
            .field("private_key_id", &self.key.private_key_id)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Deserialize)]
pub(crate) struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

pub fn acquire_credential(source: &CredentialSource) -> anyhow::Result<Credential> {
    let raw = match source {
        CredentialSource::FilePath(path) => {
            if path.as_os_str().is_empty() {
                return Err(ConfigurationError::new("credential file path is empty").into());
            }
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read credential file {}", path.display()))?
        }
        CredentialSource::InlineJson(json) => json.clone(),
    };

    if raw.trim().is_empty() {
        return Err(ConfigurationError::new("credential payload is empty").into());
    }

    let key = serde_json::from_str::<ServiceAccountKey>(&raw)
        .context("failed to parse service account credential JSON")?;

    if !key.key_type.is_empty() {
        anyhow::ensure!(
            key.key_type == "service_account",
            "unsupported credential type: {}",
            key.key_type
        );
    }
    anyhow::ensure!(
        !key.client_email.trim().is_empty(),
        "credential client_email must be non-empty"
    );
    anyhow::ensure!(
        key.private_key.contains("PRIVATE KEY"),
        "credential private_key is not a PEM key"
    );

    Ok(Credential { key })
}
