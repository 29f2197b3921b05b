//! Client for the REST collaborator.
//!
//! Every call carries the bearer token from a [`TokenStore`] when one is
//! present. A `401` on an authenticated call means the token went stale: it
//! is cleared and the call is sent once more without it.

use std::sync::{Arc, Mutex};

use eventsync_core::auth::Session;
use eventsync_core::model::{
    Attendee, AttendeeDraft, EntityId, Event, EventDraft, Task, TaskDraft, TaskUpdate,
    ValidationError,
};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

const UNKNOWN_ERROR: &str = "An unknown error occurred";

/// Where the bearer token lives between calls.
pub trait TokenStore: Send + Sync + 'static {
    fn token(&self) -> Option<String>;

    fn clear(&self);
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: Mutex::new(token),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn token(&self) -> Option<String> {
        self.token.lock().map(|token| token.clone()).unwrap_or_default()
    }

    fn clear(&self) {
        if let Ok(mut token) = self.token.lock() {
            *token = None;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// Non-2xx answer; `message` is what the server said, or a fallback.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("Cannot connect to server. Please check if the backend is running on {base}")]
    Unreachable {
        base: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{method} {path} returned no body")]
    MissingBody { method: Method, path: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl RestError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: String,
    tokens: Arc<dyn TokenStore>,
}

impl RestClient {
    pub fn new(base: impl Into<String>, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Send one JSON request. `Ok(None)` means the server answered with no
    /// content.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<T>, RestError> {
        let url = format!("{}{}", self.base, path);
        let token = self.tokens.token();

        let mut response = self.send(method.clone(), &url, body.as_ref(), token.as_deref()).await?;
        if response.status() == StatusCode::UNAUTHORIZED && token.is_some() {
            tracing::warn!(%method, path, "token rejected, retrying without it");
            self.tokens.clear();
            let rejected = error_message(response).await;
            let retried = self.send(method.clone(), &url, body.as_ref(), None).await?;
            if !retried.status().is_success() {
                // The first rejection is what the caller needs to see.
                tracing::debug!(
                    %method,
                    path,
                    retry_status = retried.status().as_u16(),
                    reason = %rejected,
                    "request rejected"
                );
                return Err(RestError::Status {
                    status: StatusCode::UNAUTHORIZED,
                    message: rejected,
                });
            }
            response = retried;
        }

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            tracing::debug!(
                %method,
                path,
                status = status.as_u16(),
                reason = %message,
                "request rejected"
            );
            return Err(RestError::Status { status, message });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let bytes = response.bytes().await.map_err(RestError::Request)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Response, RestError> {
        let mut request = self.http.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(|source| {
            if source.is_connect() {
                RestError::Unreachable {
                    base: self.base.clone(),
                    source,
                }
            } else {
                RestError::Request(source)
            }
        })
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: String,
        body: Option<Value>,
    ) -> Result<T, RestError> {
        match self.request(method.clone(), &path, body).await? {
            Some(value) => Ok(value),
            None => Err(RestError::MissingBody { method, path }),
        }
    }

    async fn list<T: DeserializeOwned>(&self, path: String) -> Result<Vec<T>, RestError> {
        Ok(self.request(Method::GET, &path, None).await?.unwrap_or_default())
    }

    async fn delete(&self, path: String) -> Result<(), RestError> {
        self.request::<Value>(Method::DELETE, &path, None).await?;
        Ok(())
    }

    pub async fn profile(&self) -> Result<Session, RestError> {
        self.fetch(Method::GET, "/auth/profile".to_string(), None).await
    }

    pub async fn list_events(&self) -> Result<Vec<Event>, RestError> {
        self.list("/events".to_string()).await
    }

    pub async fn create_event(&self, draft: &EventDraft) -> Result<Event, RestError> {
        draft.validate()?;
        self.fetch(Method::POST, "/events".to_string(), Some(to_body(draft)?)).await
    }

    pub async fn update_event(
        &self,
        event_id: &EntityId,
        draft: &EventDraft,
    ) -> Result<Event, RestError> {
        draft.validate()?;
        self.fetch(Method::PUT, format!("/events/{event_id}"), Some(to_body(draft)?))
            .await
    }

    pub async fn delete_event(&self, event_id: &EntityId) -> Result<(), RestError> {
        self.delete(format!("/events/{event_id}")).await
    }

    pub async fn list_tasks(&self, event_id: &EntityId) -> Result<Vec<Task>, RestError> {
        self.list(format!("/events/{event_id}/tasks")).await
    }

    pub async fn create_task(
        &self,
        event_id: &EntityId,
        draft: &TaskDraft,
    ) -> Result<Task, RestError> {
        draft.validate()?;
        self.fetch(Method::POST, format!("/events/{event_id}/tasks"), Some(to_body(draft)?))
            .await
    }

    pub async fn update_task(
        &self,
        event_id: &EntityId,
        task_id: &EntityId,
        draft: &TaskDraft,
    ) -> Result<Task, RestError> {
        draft.validate()?;
        self.fetch(
            Method::PUT,
            format!("/events/{event_id}/tasks/{task_id}"),
            Some(to_body(draft)?),
        )
        .await
    }

    /// Flip the completion flag of `task`, returning the server's copy.
    pub async fn toggle_task(&self, event_id: &EntityId, task: &Task) -> Result<Task, RestError> {
        let update = TaskUpdate::toggled(task);
        self.fetch(
            Method::PUT,
            format!("/events/{event_id}/tasks/{}", task.id),
            Some(to_body(&update)?),
        )
        .await
    }

    pub async fn delete_task(
        &self,
        event_id: &EntityId,
        task_id: &EntityId,
    ) -> Result<(), RestError> {
        self.delete(format!("/events/{event_id}/tasks/{task_id}")).await
    }

    pub async fn list_attendees(&self, event_id: &EntityId) -> Result<Vec<Attendee>, RestError> {
        self.list(format!("/events/{event_id}/attendees")).await
    }

    pub async fn create_attendee(
        &self,
        event_id: &EntityId,
        draft: &AttendeeDraft,
    ) -> Result<Attendee, RestError> {
        draft.validate()?;
        self.fetch(
            Method::POST,
            format!("/events/{event_id}/attendees"),
            Some(to_body(draft)?),
        )
        .await
    }

    pub async fn update_attendee(
        &self,
        event_id: &EntityId,
        attendee_id: &EntityId,
        draft: &AttendeeDraft,
    ) -> Result<Attendee, RestError> {
        draft.validate()?;
        self.fetch(
            Method::PUT,
            format!("/events/{event_id}/attendees/{attendee_id}"),
            Some(to_body(draft)?),
        )
        .await
    }

    pub async fn delete_attendee(
        &self,
        event_id: &EntityId,
        attendee_id: &EntityId,
    ) -> Result<(), RestError> {
        self.delete(format!("/events/{event_id}/attendees/{attendee_id}"))
            .await
    }
}

fn to_body(value: &impl Serialize) -> Result<Value, RestError> {
    Ok(serde_json::to_value(value)?)
}

/// Server-provided `message`, or a fallback when the body is not JSON.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let Ok(text) = response.text().await else {
        return UNKNOWN_ERROR.to_string();
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(body) => body
            .get("message")
            .and_then(Value::as_str)
            .filter(|message| !message.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16())),
        Err(_) => UNKNOWN_ERROR.to_string(),
    }
}
