use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::date;
use super::id::EntityId;

/// The entity kinds the push channel knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Event,
    Task,
    Attendee,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Event => "event",
            EntityKind::Task => "task",
            EntityKind::Attendee => "attendee",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A server-side record with a stable identity.
pub trait Entity: Clone + std::fmt::Debug + Serialize + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &EntityId;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, with = "date")]
    pub date: Option<NaiveDate>,
    /// Fields this client does not model, kept so snapshots stay lossless.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The attendee a task is assigned to, as embedded in task payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendeeRef {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: EntityId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, with = "date")]
    pub deadline: Option<NaiveDate>,
    #[serde(default, alias = "attendee_id", skip_serializing_if = "Option::is_none")]
    pub assigned_attendee_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_attendee: Option<AttendeeRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Id of the assigned attendee, whichever field the server filled in.
    pub fn assignee_id(&self) -> Option<&EntityId> {
        self.assigned_attendee_id
            .as_ref()
            .or_else(|| self.assigned_attendee.as_ref().map(|a| &a.id))
    }

    /// Whether the task belongs to the user with `email` (case-insensitive).
    pub fn is_assigned_to(&self, email: &str) -> bool {
        self.assigned_attendee
            .as_ref()
            .and_then(|a| a.email.as_deref())
            .is_some_and(|assigned| assigned.eq_ignore_ascii_case(email.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for Event {
    const KIND: EntityKind = EntityKind::Event;

    fn id(&self) -> &EntityId {
        &self.id
    }
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn id(&self) -> &EntityId {
        &self.id
    }
}

impl Entity for Attendee {
    const KIND: EntityKind = EntityKind::Attendee;

    fn id(&self) -> &EntityId {
        &self.id
    }
}
