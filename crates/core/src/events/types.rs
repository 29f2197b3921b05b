use serde::{Deserialize, Serialize};

use crate::model::{Attendee, EntityId, EntityKind, Event, Task};

/// Server-pushed mutation notifications, one JSON object per frame.
///
/// Task and attendee variants carry the owning event in `eventId`; deletes
/// carry a bare id instead of a `data` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PushMessage {
    EventCreate {
        data: Event,
    },
    EventUpdate {
        data: Event,
    },
    #[serde(rename_all = "camelCase")]
    EventDelete {
        event_id: EntityId,
    },
    #[serde(rename_all = "camelCase")]
    TaskCreate {
        event_id: Option<EntityId>,
        data: Task,
    },
    #[serde(rename_all = "camelCase")]
    TaskUpdate {
        event_id: Option<EntityId>,
        data: Task,
    },
    #[serde(rename_all = "camelCase")]
    TaskDelete {
        event_id: Option<EntityId>,
        task_id: EntityId,
    },
    #[serde(rename_all = "camelCase")]
    AttendeeCreate {
        event_id: Option<EntityId>,
        data: Attendee,
    },
    #[serde(rename_all = "camelCase")]
    AttendeeUpdate {
        event_id: Option<EntityId>,
        data: Attendee,
    },
    #[serde(rename_all = "camelCase")]
    AttendeeDelete {
        event_id: Option<EntityId>,
        attendee_id: EntityId,
    },
    /// Liveness signal; needs no reply.
    Ping,
    SystemStatus {
        #[serde(default)]
        status: String,
        #[serde(default)]
        message: String,
    },
}

impl PushMessage {
    /// Wire name of the variant, for log fields.
    pub fn type_name(&self) -> &'static str {
        match self {
            PushMessage::EventCreate { .. } => "EVENT_CREATE",
            PushMessage::EventUpdate { .. } => "EVENT_UPDATE",
            PushMessage::EventDelete { .. } => "EVENT_DELETE",
            PushMessage::TaskCreate { .. } => "TASK_CREATE",
            PushMessage::TaskUpdate { .. } => "TASK_UPDATE",
            PushMessage::TaskDelete { .. } => "TASK_DELETE",
            PushMessage::AttendeeCreate { .. } => "ATTENDEE_CREATE",
            PushMessage::AttendeeUpdate { .. } => "ATTENDEE_UPDATE",
            PushMessage::AttendeeDelete { .. } => "ATTENDEE_DELETE",
            PushMessage::Ping => "PING",
            PushMessage::SystemStatus { .. } => "SYSTEM_STATUS",
        }
    }

    /// Entity kind the message mutates, `None` for channel housekeeping.
    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            PushMessage::EventCreate { .. }
            | PushMessage::EventUpdate { .. }
            | PushMessage::EventDelete { .. } => Some(EntityKind::Event),
            PushMessage::TaskCreate { .. }
            | PushMessage::TaskUpdate { .. }
            | PushMessage::TaskDelete { .. } => Some(EntityKind::Task),
            PushMessage::AttendeeCreate { .. }
            | PushMessage::AttendeeUpdate { .. }
            | PushMessage::AttendeeDelete { .. } => Some(EntityKind::Attendee),
            PushMessage::Ping | PushMessage::SystemStatus { .. } => None,
        }
    }
}

/// User-facing notifications raised while reconciling push messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SyncNotice {
    EventCreated { name: String },
    EventUpdated { name: String },
    EventDeleted { id: EntityId },
    TaskCreated { title: String },
    TaskCompleted { title: String },
    TaskDeleted { id: EntityId },
    AttendeeCreated { name: String },
    AttendeeUpdated { name: String },
    AttendeeRemoved { id: EntityId },
    SystemStatus { status: String, message: String },
}

impl SyncNotice {
    /// Text shown to the user.
    pub fn message(&self) -> String {
        match self {
            SyncNotice::EventCreated { name } => format!("New event \"{name}\" created."),
            SyncNotice::EventUpdated { name } => format!("Event \"{name}\" updated."),
            SyncNotice::EventDeleted { .. } => "Event deleted.".to_string(),
            SyncNotice::TaskCreated { title } => format!("New task \"{title}\" added."),
            SyncNotice::TaskCompleted { title } => format!("Task \"{title}\" completed!"),
            SyncNotice::TaskDeleted { .. } => "Task deleted.".to_string(),
            SyncNotice::AttendeeCreated { name } => format!("New attendee \"{name}\" added."),
            SyncNotice::AttendeeUpdated { name } => format!("Attendee \"{name}\" updated."),
            SyncNotice::AttendeeRemoved { .. } => "Attendee removed.".to_string(),
            SyncNotice::SystemStatus { status, message } => {
                format!("System status {status}: {message}")
            }
        }
    }
}
