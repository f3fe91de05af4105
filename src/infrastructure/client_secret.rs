use crate::infrastructure::error::InfraError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// OAuth client application identity, as downloaded from the Google Cloud
/// console ("Desktop app" credentials).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecretSection>,
    web: Option<ClientSecretSection>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretSection {
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl ClientSecret {
    pub fn from_file(path: &Path) -> Result<Self, InfraError> {
        let raw = fs::read_to_string(path).map_err(|error| {
            InfraError::OAuth(format!(
                "failed reading client secret file {}: {error}",
                path.display()
            ))
        })?;
        Self::from_json(&raw)
            .map_err(|error| InfraError::OAuth(format!("{} ({})", error, path.display())))
    }

    pub fn from_json(raw: &str) -> Result<Self, String> {
        let parsed: ClientSecretFile =
            serde_json::from_str(raw).map_err(|error| format!("invalid client secret JSON: {error}"))?;
        let section = parsed
            .installed
            .or(parsed.web)
            .ok_or_else(|| "client secret has neither an \"installed\" nor a \"web\" section".to_string())?;

        let client_id = non_empty(section.client_id)
            .ok_or_else(|| "client secret is missing client_id".to_string())?;
        let client_secret = non_empty(section.client_secret)
            .ok_or_else(|| "client secret is missing client_secret".to_string())?;

        Ok(Self {
            client_id,
            client_secret,
            authorization_endpoint: non_empty(section.auth_uri)
                .unwrap_or_else(|| DEFAULT_AUTHORIZATION_ENDPOINT.to_string()),
            token_endpoint: non_empty(section.token_uri)
                .unwrap_or_else(|| DEFAULT_TOKEN_ENDPOINT.to_string()),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
