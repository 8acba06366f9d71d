//! OAuth credentials for the calendar account.
//!
//! Tokens come from a one-time consent flow in the browser (`guido auth`) and are
//! kept in a [`CredentialStore`]. [`GoogleAuth`] hands out access tokens, refreshing
//! and persisting them as they expire.
mod consent;
mod google_auth;
mod store;

pub use consent::{Consent, CALENDAR_SCOPE};
pub use google_auth::{ClientSecrets, GoogleAuth};
pub use store::{default_token_path, CredentialStore, FileCredentialStore};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tokens are treated as expired this long before they actually expire
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) <= Utc::now())
            .unwrap_or(false)
    }
}

/// Token endpoint response, shared by the code exchange and refresh grants
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_token(self, previous_refresh_token: Option<String>) -> OAuthToken {
        let expires_in = self.expires_in.unwrap_or(3600);
        OAuthToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh_token),
            expires_at: Some(Utc::now() + Duration::seconds(expires_in)),
        }
    }
}

/// Something that can produce a bearer token for api calls
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}
