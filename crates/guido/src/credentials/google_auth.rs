use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::consent::Consent;
use super::store::CredentialStore;
use super::{OAuthToken, TokenResponse, TokenSource};

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// The OAuth client downloaded from the Google cloud console
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parse the console's json bundle, for either a desktop or a web client
    pub fn from_json(json: &str) -> Result<Self> {
        let file: SecretsFile =
            serde_json::from_str(json).context("Malformed Google client credentials")?;
        file.installed
            .or(file.web)
            .ok_or_else(|| anyhow!("Google client credentials need an 'installed' or 'web' entry"))
    }
}

/// Access tokens for the calendar api, refreshed on demand
pub struct GoogleAuth {
    client: Client,
    secrets: ClientSecrets,
    store: Box<dyn CredentialStore>,
    cached: Mutex<Option<OAuthToken>>,
}

impl GoogleAuth {
    pub fn new(secrets: ClientSecrets, store: Box<dyn CredentialStore>) -> Self {
        Self {
            client: Client::new(),
            secrets,
            store,
            cached: Mutex::new(None),
        }
    }

    /// Run the browser consent flow and store the resulting token
    pub async fn authorize(&self) -> Result<OAuthToken> {
        let token = Consent::new(self.secrets.clone()).run(&self.client).await?;
        self.store.persist(&token)?;
        *self.cached.lock().await = Some(token.clone());
        Ok(token)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<OAuthToken> {
        debug!("Refreshing Google access token");
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
        ];
        let response = self
            .client
            .post(&self.secrets.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let err_text = response.text().await?;
            return Err(anyhow!(
                "Failed to refresh the Google token: {}. Run `guido auth` to authorize again.",
                err_text
            ));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.into_token(Some(refresh_token.to_string())))
    }
}

#[async_trait]
impl TokenSource for GoogleAuth {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if cached.is_none() {
            *cached = self.store.load()?;
        }

        let token = cached
            .as_ref()
            .ok_or_else(|| anyhow!("No Google credentials found. Run `guido auth` first."))?;
        if !token.is_expired() {
            return Ok(token.access_token.clone());
        }

        let refresh_token = token.refresh_token.clone().ok_or_else(|| {
            anyhow!("The Google token expired and cannot be refreshed. Run `guido auth` again.")
        })?;
        let refreshed = self.refresh(&refresh_token).await?;
        self.store.persist(&refreshed)?;
        let access_token = refreshed.access_token.clone();
        *cached = Some(refreshed);
        Ok(access_token)
    }
}
