use crate::domain::models::{DEFAULT_TRIGGER_PHRASES, PRIMARY_CALENDAR_ID};
use crate::infrastructure::chat_client::{DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
use crate::infrastructure::credential_store::DEFAULT_TOKEN_DIR;
use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "chatcal.json";
const SUPPORTED_SCHEMA: u64 = 1;

const DEFAULT_CLIENT_SECRET_FILE: &str = "credentials.json";
const DEFAULT_TIMEZONE: &str = "America/New_York";
const DEFAULT_EVENT_SUMMARY: &str = "Meeting from AI Agent";
const DEFAULT_CONSENT_TIMEOUT_SECONDS: u64 = 300;
const DEFAULT_MODEL_TIMEOUT_SECONDS: u64 = 120;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub model: String,
    pub ollama_url: String,
    pub client_secret_file: PathBuf,
    pub token_dir: PathBuf,
    pub timezone: Tz,
    pub event_summary: String,
    pub calendar_id: String,
    pub trigger_phrases: Vec<String>,
    pub consent_timeout: Duration,
    pub model_timeout: Duration,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    schema: Option<u64>,
    model: Option<String>,
    ollama_url: Option<String>,
    client_secret_file: Option<String>,
    token_dir: Option<String>,
    timezone: Option<String>,
    event_summary: Option<String>,
    calendar_id: Option<String>,
    trigger_phrases: Option<Vec<String>>,
    consent_timeout_seconds: Option<u64>,
    model_timeout_seconds: Option<u64>,
}

/// Command-line values; they take precedence over both file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub model: Option<String>,
    pub ollama_url: Option<String>,
    pub client_secret_file: Option<PathBuf>,
    pub timezone: Option<String>,
}

impl AppConfig {
    /// Reads `path` if it exists, then applies environment and CLI overrides.
    /// Relative paths resolve against `working_dir`.
    pub fn load(
        working_dir: &Path,
        path: &Path,
        overrides: ConfigOverrides,
    ) -> Result<Self, InfraError> {
        let file = read_config_file(path)?;
        Self::from_sources(working_dir, file, |key| std::env::var(key).ok(), overrides)
    }

    fn from_sources<F>(
        working_dir: &Path,
        file: ConfigFile,
        lookup: F,
        overrides: ConfigOverrides,
    ) -> Result<Self, InfraError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model = first_non_empty([
            overrides.model,
            lookup("CHATCAL_MODEL"),
            file.model,
        ])
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let ollama_url = first_non_empty([
            overrides.ollama_url,
            lookup("CHATCAL_OLLAMA_URL"),
            lookup("OLLAMA_HOST").map(normalize_ollama_host),
            file.ollama_url,
        ])
        .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        let client_secret_file = overrides
            .client_secret_file
            .or_else(|| {
                first_non_empty([lookup("CHATCAL_CLIENT_SECRET_FILE"), file.client_secret_file])
                    .map(PathBuf::from)
            })
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CLIENT_SECRET_FILE));
        let token_dir = first_non_empty([lookup("CHATCAL_TOKEN_DIR"), file.token_dir])
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_DIR));
        let timezone_name = first_non_empty([
            overrides.timezone,
            lookup("CHATCAL_TIMEZONE"),
            file.timezone,
        ])
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone = timezone_name.parse::<Tz>().map_err(|_| {
            InfraError::InvalidConfig(format!("unknown timezone {timezone_name:?}"))
        })?;

        let trigger_phrases = match file.trigger_phrases {
            Some(phrases) => {
                let phrases: Vec<String> = phrases
                    .into_iter()
                    .map(|phrase| phrase.trim().to_string())
                    .filter(|phrase| !phrase.is_empty())
                    .collect();
                if phrases.is_empty() {
                    return Err(InfraError::InvalidConfig(
                        "triggerPhrases must contain at least one phrase".to_string(),
                    ));
                }
                phrases
            }
            None => DEFAULT_TRIGGER_PHRASES
                .iter()
                .map(|phrase| phrase.to_string())
                .collect(),
        };

        let consent_timeout_seconds = file
            .consent_timeout_seconds
            .unwrap_or(DEFAULT_CONSENT_TIMEOUT_SECONDS);
        if consent_timeout_seconds == 0 {
            return Err(InfraError::InvalidConfig(
                "consentTimeoutSeconds must be > 0".to_string(),
            ));
        }
        let model_timeout_seconds = file
            .model_timeout_seconds
            .unwrap_or(DEFAULT_MODEL_TIMEOUT_SECONDS);
        if model_timeout_seconds == 0 {
            return Err(InfraError::InvalidConfig(
                "modelTimeoutSeconds must be > 0".to_string(),
            ));
        }

        Ok(Self {
            model,
            ollama_url,
            client_secret_file: resolve(working_dir, client_secret_file),
            token_dir: resolve(working_dir, token_dir),
            timezone,
            event_summary: first_non_empty([file.event_summary])
                .unwrap_or_else(|| DEFAULT_EVENT_SUMMARY.to_string()),
            calendar_id: first_non_empty([file.calendar_id])
                .unwrap_or_else(|| PRIMARY_CALENDAR_ID.to_string()),
            trigger_phrases,
            consent_timeout: Duration::from_secs(consent_timeout_seconds),
            model_timeout: Duration::from_secs(model_timeout_seconds),
        })
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, InfraError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(ConfigFile::default()),
        Err(error) => return Err(error.into()),
    };
    let parsed: ConfigFile = serde_json::from_str(&raw)?;
    let schema = parsed
        .schema
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn first_non_empty<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

// OLLAMA_HOST is commonly given as host:port without a scheme.
fn normalize_ollama_host(host: String) -> String {
    let host = host.trim();
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

fn resolve(working_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        working_dir.join(path)
    }
}
