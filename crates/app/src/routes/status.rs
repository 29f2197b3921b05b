use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;
use crate::view::ViewSnapshot;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/status", get(status))
        .route("/v1/snapshot", get(snapshot))
}

/// Connection state, last errors and collection sizes.
async fn status(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.view().snapshot();
    let session = state.session();
    Json(json!({
        "connection": snapshot.connection,
        "streamError": snapshot.stream_error,
        "lastError": snapshot.last_error,
        "selectedEvent": snapshot.store.selected_event,
        "counts": {
            "events": snapshot.store.events.len(),
            "tasks": snapshot.store.tasks.len(),
            "attendees": snapshot.store.attendees.len(),
        },
        "user": {
            "email": session.email,
            "role": session.role,
        },
    }))
}

async fn snapshot(State(state): State<AppState>) -> Json<ViewSnapshot> {
    Json(state.view().snapshot())
}
