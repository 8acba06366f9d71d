use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::OAuthToken;

/// Where tokens live when no path is configured
pub fn default_token_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("guido")
        .join("google")
        .join("token.json")
}

pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<OAuthToken>>;
    fn persist(&self, token: &OAuthToken) -> Result<()>;
}

/// Keeps the token as json in a single file
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileCredentialStore {
    fn default() -> Self {
        Self::new(default_token_path())
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<OAuthToken>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let token = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed token file {}", self.path.display()))?;
        Ok(Some(token))
    }

    fn persist(&self, token: &OAuthToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(token)?)?;
        Ok(())
    }
}
