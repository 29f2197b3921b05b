use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/ping", get(ping))
}

/// Reports the push stream alongside liveness; a dropped stream is not an
/// unhealthy process, it reconnects on its own.
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.view().snapshot();
    Json(json!({
        "status": "ok",
        "stream": snapshot.connection,
        "api": state.config().api_base_url,
    }))
}

async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
