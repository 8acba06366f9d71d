use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{stream::StreamExt, Stream};
use guido::errors::ReplyError;
use guido::models::event::StreamEvent;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
struct ReplyRequest {
    prompt: String,
}

/// Server-sent events carrying one json object per frame
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);
        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            body,
        )
            .into_response()
    }
}

struct EventFormatter;

impl EventFormatter {
    fn frame(value: &serde_json::Value) -> String {
        format!("data: {}\n\n", value)
    }

    fn format_event(event: &StreamEvent) -> String {
        let value = serde_json::to_value(event).unwrap_or_else(|e| {
            json!({"type": "error", "reason": "failed", "message": e.to_string()})
        });
        Self::frame(&value)
    }

    fn format_error(error: &ReplyError) -> String {
        let reason = match error {
            ReplyError::TurnBudgetExhausted { .. } => "turn_budget_exhausted",
            ReplyError::Cancelled => "cancelled",
            _ => "failed",
        };
        Self::frame(&json!({
            "type": "error",
            "reason": reason,
            "message": error.to_string(),
        }))
    }

    fn format_finish() -> String {
        Self::frame(&json!({"type": "finish"}))
    }
}

async fn handler(
    State(state): State<AppState>,
    Json(request): Json<ReplyRequest>,
) -> Result<SseResponse, StatusCode> {
    if request.prompt.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let (tx, rx) = mpsc::channel(100);
    let cancel = CancellationToken::new();

    tokio::spawn(async move {
        // queries run one at a time against the shared transcript
        let mut session = state.session.clone().lock_owned().await;
        let mode = session.mode;
        let mut stream =
            state
                .agent
                .reply_stream(&mut session.transcript, request.prompt, mode, cancel.clone());
        let mut client_gone = false;

        loop {
            match timeout(Duration::from_millis(500), stream.next()).await {
                Ok(Some(Ok(event))) => {
                    if client_gone {
                        continue;
                    }
                    if tx.send(EventFormatter::format_event(&event)).await.is_err() {
                        tracing::warn!("client disconnected, stopping after the current turn");
                        client_gone = true;
                        cancel.cancel();
                    }
                }
                Ok(Some(Err(e))) => {
                    if matches!(e, ReplyError::Cancelled) {
                        tracing::info!("reply cancelled");
                    } else {
                        tracing::error!("Error processing reply: {}", e);
                    }
                    let _ = tx.send(EventFormatter::format_error(&e)).await;
                    return;
                }
                Ok(None) => break,
                Err(_) => {
                    // Heartbeat, used to detect disconnected clients while tools run
                    if tx.is_closed() && !client_gone {
                        tracing::warn!("client disconnected, stopping after the current turn");
                        client_gone = true;
                        cancel.cancel();
                    }
                }
            }
        }

        let _ = tx.send(EventFormatter::format_finish()).await;
    });

    Ok(SseResponse::new(ReceiverStream::new(rx)))
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AskResponse {
    response: String,
}

/// Blocking variant: one json answer, an apology when the turn budget runs out
async fn ask_handler(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, StatusCode> {
    if request.prompt.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    // dropping the handler (client gone) cancels the reply at its next turn
    let cancel = CancellationToken::new();
    let _disconnect = cancel.clone().drop_guard();

    let task = tokio::spawn(async move {
        let mut session = state.session.clone().lock_owned().await;
        let mode = session.mode;
        state
            .agent
            .reply(&mut session.transcript, &request.prompt, mode, &cancel)
            .await
    });

    let outcome = task
        .await
        .map_err(|e| {
            tracing::error!("Ask task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            tracing::error!("Error processing ask: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(AskResponse {
        response: outcome.into_text(),
    }))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/reply", post(handler))
        .route("/ask", post(ask_handler))
        .with_state(state)
}
