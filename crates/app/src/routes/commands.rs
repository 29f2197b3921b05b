use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use eventsync_core::model::{AttendeeDraft, EntityId, EventDraft, Task, TaskDraft};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::view::ViewCommand;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/events", post(create_event))
        .route("/v1/events/{id}", put(update_event).delete(delete_event))
        .route("/v1/events/{id}/open", post(open_event))
        .route("/v1/events/close", post(close_event))
        .route("/v1/tasks", post(create_task))
        .route("/v1/tasks/{id}/toggle", post(toggle_task))
        .route("/v1/tasks/{id}", put(update_task).delete(delete_task))
        .route("/v1/attendees", post(create_attendee))
        .route(
            "/v1/attendees/{id}",
            put(update_attendee).delete(delete_attendee),
        )
        .route("/v1/stream/reconnect", post(reconnect))
        .route("/v1/stream/visibility", post(set_visibility))
}

#[derive(Debug, Deserialize)]
struct Visibility {
    visible: bool,
}

type Accepted = (StatusCode, Json<Value>);

async fn dispatch(state: &AppState, command: ViewCommand) -> ApiResult<Accepted> {
    state.view().send(command).await.map_err(|_| ApiError::Unavailable)?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))))
}

async fn open_event(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Accepted> {
    let event_id = listed_event(&state, id)?;
    dispatch(&state, ViewCommand::OpenEvent(event_id)).await
}

async fn close_event(State(state): State<AppState>) -> ApiResult<Accepted> {
    dispatch(&state, ViewCommand::CloseEvent).await
}

async fn create_event(
    State(state): State<AppState>,
    Json(draft): Json<EventDraft>,
) -> ApiResult<Accepted> {
    require_admin(&state, "create events")?;
    draft.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    dispatch(&state, ViewCommand::CreateEvent(draft)).await
}

async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<EventDraft>,
) -> ApiResult<Accepted> {
    require_admin(&state, "edit events")?;
    let event_id = listed_event(&state, id)?;
    draft.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    dispatch(&state, ViewCommand::UpdateEvent(event_id, draft)).await
}

async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Accepted> {
    require_admin(&state, "delete events")?;
    let event_id = listed_event(&state, id)?;
    dispatch(&state, ViewCommand::DeleteEvent(event_id)).await
}

/// Only tasks of the open event can be toggled, and users only toggle the
/// ones assigned to them.
async fn toggle_task(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Accepted> {
    let task = listed_task(&state, id)?;
    let session = state.session();
    if !session.is_admin() && !task.is_assigned_to(&session.email) {
        return Err(ApiError::Forbidden(format!("task {} is not assigned to you", task.id)));
    }
    dispatch(&state, ViewCommand::ToggleTask(task.id)).await
}

async fn create_task(
    State(state): State<AppState>,
    Json(draft): Json<TaskDraft>,
) -> ApiResult<Accepted> {
    require_admin(&state, "create tasks")?;
    require_open_event(&state)?;
    draft.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    dispatch(&state, ViewCommand::CreateTask(draft)).await
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<TaskDraft>,
) -> ApiResult<Accepted> {
    require_admin(&state, "edit tasks")?;
    let task = listed_task(&state, id)?;
    draft.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    dispatch(&state, ViewCommand::UpdateTask(task.id, draft)).await
}

async fn delete_task(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Accepted> {
    require_admin(&state, "delete tasks")?;
    let task = listed_task(&state, id)?;
    dispatch(&state, ViewCommand::DeleteTask(task.id)).await
}

async fn create_attendee(
    State(state): State<AppState>,
    Json(draft): Json<AttendeeDraft>,
) -> ApiResult<Accepted> {
    require_admin(&state, "add attendees")?;
    require_open_event(&state)?;
    draft.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    dispatch(&state, ViewCommand::CreateAttendee(draft)).await
}

async fn update_attendee(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<AttendeeDraft>,
) -> ApiResult<Accepted> {
    require_admin(&state, "edit attendees")?;
    let attendee_id = listed_attendee(&state, id)?;
    draft.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    dispatch(&state, ViewCommand::UpdateAttendee(attendee_id, draft)).await
}

async fn delete_attendee(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Accepted> {
    require_admin(&state, "remove attendees")?;
    let attendee_id = listed_attendee(&state, id)?;
    dispatch(&state, ViewCommand::DeleteAttendee(attendee_id)).await
}

async fn reconnect(State(state): State<AppState>) -> ApiResult<Accepted> {
    dispatch(&state, ViewCommand::Reconnect).await
}

async fn set_visibility(
    State(state): State<AppState>,
    Json(body): Json<Visibility>,
) -> ApiResult<Accepted> {
    dispatch(&state, ViewCommand::SetVisible(body.visible)).await
}

fn require_admin(state: &AppState, action: &str) -> ApiResult<()> {
    if state.session().is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("only admins can {action}")))
    }
}

fn parse_id(raw: String, what: &str) -> ApiResult<EntityId> {
    let id = EntityId::new(raw);
    if id.as_str().is_empty() {
        return Err(ApiError::BadRequest(format!("{what} id is empty")));
    }
    Ok(id)
}

fn listed_event(state: &AppState, raw: String) -> ApiResult<EntityId> {
    let event_id = parse_id(raw, "event")?;
    let listed = state
        .view()
        .snapshot()
        .store
        .events
        .iter()
        .any(|e| e.entity.id == event_id);
    if !listed {
        return Err(ApiError::NotFound(format!("event {event_id}")));
    }
    Ok(event_id)
}

fn require_open_event(state: &AppState) -> ApiResult<()> {
    match state.view().snapshot().store.selected_event {
        Some(_) => Ok(()),
        None => Err(ApiError::BadRequest("no event is open".to_string())),
    }
}

fn listed_task(state: &AppState, raw: String) -> ApiResult<Task> {
    let task_id = parse_id(raw, "task")?;
    let snapshot = state.view().snapshot();
    if snapshot.store.selected_event.is_none() {
        return Err(ApiError::BadRequest("no event is open".to_string()));
    }
    snapshot
        .store
        .tasks
        .into_iter()
        .map(|t| t.entity)
        .find(|t| t.id == task_id)
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id}")))
}

fn listed_attendee(state: &AppState, raw: String) -> ApiResult<EntityId> {
    let attendee_id = parse_id(raw, "attendee")?;
    let snapshot = state.view().snapshot();
    if snapshot.store.selected_event.is_none() {
        return Err(ApiError::BadRequest("no event is open".to_string()));
    }
    if !snapshot.store.attendees.iter().any(|a| a.entity.id == attendee_id) {
        return Err(ApiError::NotFound(format!("attendee {attendee_id}")));
    }
    Ok(attendee_id)
}
