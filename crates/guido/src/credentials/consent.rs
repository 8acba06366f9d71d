use anyhow::{anyhow, Context, Result};
use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use base64::Engine;
use reqwest::Client;
use sha2::Digest;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;
use url::Url;

use super::google_auth::ClientSecrets;
use super::{OAuthToken, TokenResponse};

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// One run of the browser consent flow, with PKCE
pub struct Consent {
    secrets: ClientSecrets,
    state: String,
    verifier: String,
}

type CodeSender = Arc<Mutex<Option<oneshot::Sender<Result<String, String>>>>>;

#[derive(Clone)]
struct CallbackState {
    expected_state: String,
    tx: CodeSender,
}

async fn callback(
    State(callback): State<CallbackState>,
    Query(params): Query<HashMap<String, String>>,
) -> &'static str {
    let (outcome, page) = if let Some(error) = params.get("error") {
        (Err(error.clone()), "Authorization was denied. You can close this window.")
    } else {
        match (params.get("code"), params.get("state")) {
            (Some(code), Some(state)) if *state == callback.expected_state => (
                Ok(code.clone()),
                "Authentication successful! You can close this window.",
            ),
            (Some(_), _) => return "State mismatch.",
            _ => return "Authentication failed.",
        }
    };

    if let Ok(mut tx) = callback.tx.lock() {
        if let Some(tx) = tx.take() {
            let _ = tx.send(outcome);
        }
    }
    page
}

impl Consent {
    pub fn new(secrets: ClientSecrets) -> Self {
        Self {
            secrets,
            state: nanoid::nanoid!(16),
            verifier: nanoid::nanoid!(64),
        }
    }

    fn challenge(&self) -> String {
        let digest = sha2::Sha256::digest(self.verifier.as_bytes());
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
    }

    pub fn authorization_url(&self, redirect_uri: &str) -> Result<Url> {
        let challenge = self.challenge();
        let url = Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("response_type", "code"),
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", CALENDAR_SCOPE),
                ("state", self.state.as_str()),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
                // offline access is what yields a refresh token
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )?;
        Ok(url)
    }

    /// Open the consent page, wait for the redirect and trade the code for a token
    pub async fn run(&self, client: &Client) -> Result<OAuthToken> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
        let url = self.authorization_url(&redirect_uri)?;

        if webbrowser::open(url.as_str()).is_err() {
            println!("Open this URL in your browser:\n{}", url);
        }
        info!("Waiting for the consent redirect on {}", redirect_uri);

        let code = self.receive_code(listener).await?;
        self.exchange_code(client, &code, &redirect_uri).await
    }

    async fn receive_code(&self, listener: TcpListener) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        let state = CallbackState {
            expected_state: self.state.clone(),
            tx: Arc::new(Mutex::new(Some(tx))),
        };
        let app = Router::new().route("/", get(callback)).with_state(state);
        let server = tokio::spawn(async move { axum::serve(listener, app).await });

        let outcome = rx.await;
        server.abort();

        outcome
            .context("Consent server stopped before receiving an authorization code")?
            .map_err(|e| anyhow!("Authorization was denied: {}", e))
    }

    async fn exchange_code(
        &self,
        client: &Client,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthToken> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", self.verifier.as_str()),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
        ];
        let response = client
            .post(&self.secrets.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let err_text = response.text().await?;
            return Err(anyhow!("Failed to exchange code for token: {}", err_text));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.into_token(None))
    }
}
