use crate::domain::models::{CredentialKey, OAuthToken};
use crate::infrastructure::error::InfraError;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

pub const DEFAULT_TOKEN_DIR: &str = "token files";

pub trait CredentialStore: Send + Sync {
    fn save_token(&self, key: &CredentialKey, token: &OAuthToken) -> Result<(), InfraError>;
    fn load_token(&self, key: &CredentialKey) -> Result<Option<OAuthToken>, InfraError>;
    fn delete_token(&self, key: &CredentialKey) -> Result<(), InfraError>;
}

/// One JSON file per credential key under a fixed directory.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    token_dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(token_dir: impl Into<PathBuf>) -> Self {
        Self {
            token_dir: token_dir.into(),
        }
    }

    /// `<working_dir>/token files`.
    pub fn in_working_dir(working_dir: &Path) -> Self {
        Self::new(working_dir.join(DEFAULT_TOKEN_DIR))
    }

    pub fn token_dir(&self) -> &Path {
        &self.token_dir
    }

    pub fn token_path(&self, key: &CredentialKey) -> PathBuf {
        self.token_dir.join(key.file_name())
    }

    fn ensure_dir(&self) -> Result<(), InfraError> {
        fs::create_dir_all(&self.token_dir).map_err(|error| {
            InfraError::Credential(format!(
                "failed creating token directory {}: {error}",
                self.token_dir.display()
            ))
        })
    }
}

impl CredentialStore for FileCredentialStore {
    fn save_token(&self, key: &CredentialKey, token: &OAuthToken) -> Result<(), InfraError> {
        self.ensure_dir()?;
        let payload = serde_json::to_string_pretty(token)
            .map_err(|error| InfraError::Credential(error.to_string()))?;
        let path = self.token_path(key);
        fs::write(&path, format!("{payload}\n")).map_err(|error| {
            InfraError::Credential(format!("failed writing {}: {error}", path.display()))
        })
    }

    fn load_token(&self, key: &CredentialKey) -> Result<Option<OAuthToken>, InfraError> {
        self.ensure_dir()?;
        let path = self.token_path(key);
        let payload = match fs::read_to_string(&path) {
            Ok(value) => value,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(InfraError::Credential(format!(
                    "failed reading {}: {error}",
                    path.display()
                )));
            }
        };

        // A file in any other format counts as no credential; the next save
        // overwrites it.
        match serde_json::from_str::<OAuthToken>(&payload) {
            Ok(token) => Ok(Some(token)),
            Err(error) => {
                warn!(path = %path.display(), %error, "unreadable_token_file_ignored");
                Ok(None)
            }
        }
    }

    fn delete_token(&self, key: &CredentialKey) -> Result<(), InfraError> {
        let path = self.token_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(InfraError::Credential(format!(
                "failed deleting {}: {error}",
                path.display()
            ))),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    tokens: Mutex<HashMap<CredentialKey, OAuthToken>>,
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_token(&self, key: &CredentialKey, token: &OAuthToken) -> Result<(), InfraError> {
        let mut guard = self
            .tokens
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        guard.insert(key.clone(), token.clone());
        Ok(())
    }

    fn load_token(&self, key: &CredentialKey) -> Result<Option<OAuthToken>, InfraError> {
        let guard = self
            .tokens
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.get(key).cloned())
    }

    fn delete_token(&self, key: &CredentialKey) -> Result<(), InfraError> {
        let mut guard = self
            .tokens
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        guard.remove(key);
        Ok(())
    }
}
