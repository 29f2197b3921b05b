/// Request bodies for the REST collaborator, checked before a request is sent.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::date;
use super::entity::Task;
use super::id::EntityId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("event name is required")]
    MissingEventName,
    #[error("task title is required")]
    MissingTaskTitle,
    #[error("attendee name is required")]
    MissingAttendeeName,
    #[error("attendee email is required")]
    MissingAttendeeEmail,
    #[error("attendee email {0:?} is not a valid address")]
    InvalidEmail(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventDraft {
    pub name: String,
    pub description: String,
    pub location: String,
    #[serde(with = "date")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub completed: bool,
    #[serde(with = "date")]
    pub deadline: Option<NaiveDate>,
    #[serde(
        rename = "attendee_id",
        alias = "attendeeId",
        skip_serializing_if = "Option::is_none"
    )]
    pub attendee_id: Option<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendeeDraft {
    pub name: String,
    pub email: String,
}

/// Body of the completion toggle. Title and description are resent because
/// the task endpoint replaces the whole record.
#[derive(Debug, Clone, Serialize)]
pub struct TaskUpdate {
    pub title: String,
    pub description: String,
    pub completed: bool,
}

impl TaskUpdate {
    pub fn toggled(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            completed: !task.completed,
        }
    }
}

impl EventDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingEventName);
        }
        Ok(())
    }
}

impl TaskDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTaskTitle);
        }
        Ok(())
    }
}

impl AttendeeDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingAttendeeName);
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(ValidationError::MissingAttendeeEmail);
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(ValidationError::InvalidEmail(email.to_string())),
        }
    }
}
