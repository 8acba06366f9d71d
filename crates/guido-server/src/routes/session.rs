use axum::{extract::State, routing::get, Json, Router};
use guido::mode::Mode;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
struct ModeBody {
    mode: Mode,
}

async fn get_mode(State(state): State<AppState>) -> Json<ModeBody> {
    let session = state.session.lock().await;
    Json(ModeBody { mode: session.mode })
}

/// Applies from the next query on. Waits for a running query to finish.
async fn set_mode(State(state): State<AppState>, Json(request): Json<ModeBody>) -> Json<ModeBody> {
    let mut session = state.session.lock().await;
    if session.mode != request.mode {
        tracing::info!(mode = %request.mode, "switching session mode");
    }
    session.mode = request.mode;
    Json(ModeBody { mode: session.mode })
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/mode", get(get_mode).post(set_mode))
        .with_state(state)
}
