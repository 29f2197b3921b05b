pub mod date;
pub mod draft;
pub mod entity;
pub mod id;

pub use draft::{AttendeeDraft, EventDraft, TaskDraft, TaskUpdate, ValidationError};
pub use entity::{Attendee, AttendeeRef, Entity, EntityKind, Event, Task};
pub use id::EntityId;
