//! The closed event-type registry and the stored event form.
//!
//! `EventPayload` is the single source of truth for the mapping between
//! string event types and concrete payload types. The event-store reader
//! and the outbox worker both decode through it; an event type it does
//! not know is a fatal deserialization error, never a silent skip into
//! an untyped blob.

mod task;
mod user;

pub use task::{
    TaskAssigneeChanged, TaskCreated, TaskDueDateChanged, TaskEvent, TaskPriorityChanged,
    TaskStatusChanged,
};
pub use user::{AdminRightsChanged, UserCreated, UserEvent, UserUpdated};

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::domain::chat::ChatEvent;
use crate::domain::foundation::{EventEnvelope, EventId, EventMetadata, Timestamp};

/// Errors produced when decoding a stored or relayed event record.
#[derive(Debug, Error)]
pub enum EventDecodeError {
    /// The event type is not in the registry. Fatal: the record cannot be
    /// interpreted and must be surfaced, not guessed at.
    #[error("unknown event type '{0}'")]
    UnknownEventType(String),

    /// The payload does not match the registered shape for its type.
    #[error("malformed payload for '{event_type}': {source}")]
    MalformedPayload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Typed payload of any event the system knows about.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Chat(ChatEvent),
    User(UserEvent),
    Task(TaskEvent),
}

impl EventPayload {
    /// Stable registry identifier for this payload.
    pub fn event_type(&self) -> &'static str {
        match self {
            EventPayload::Chat(e) => e.event_type(),
            EventPayload::User(e) => e.event_type(),
            EventPayload::Task(e) => e.event_type(),
        }
    }

    /// Serializes the event-specific fields, without any type tag.
    pub fn to_json(&self) -> Result<JsonValue, serde_json::Error> {
        match self {
            EventPayload::Chat(e) => e.to_json(),
            EventPayload::User(e) => e.to_json(),
            EventPayload::Task(e) => e.to_json(),
        }
    }

    /// Aggregate type the payload family belongs to.
    pub fn aggregate_type(&self) -> &'static str {
        match self {
            EventPayload::Chat(_) => "Chat",
            EventPayload::User(_) => "User",
            EventPayload::Task(_) => "Task",
        }
    }

    /// Decodes a payload from its registry identifier and raw JSON.
    pub fn decode(event_type: &str, payload: &JsonValue) -> Result<Self, EventDecodeError> {
        fn from<T: serde::de::DeserializeOwned>(
            value: &JsonValue,
        ) -> Result<T, serde_json::Error> {
            serde_json::from_value(value.clone())
        }

        let malformed = |source| EventDecodeError::MalformedPayload {
            event_type: event_type.to_string(),
            source,
        };

        let decoded = match event_type {
            "chat.created" => EventPayload::Chat(ChatEvent::Created(from(payload).map_err(malformed)?)),
            "chat.participant_added" => {
                EventPayload::Chat(ChatEvent::ParticipantAdded(from(payload).map_err(malformed)?))
            }
            "chat.participant_removed" => {
                EventPayload::Chat(ChatEvent::ParticipantRemoved(from(payload).map_err(malformed)?))
            }
            "chat.type_changed" => {
                EventPayload::Chat(ChatEvent::TypeChanged(from(payload).map_err(malformed)?))
            }
            "chat.status_changed" => {
                EventPayload::Chat(ChatEvent::StatusChanged(from(payload).map_err(malformed)?))
            }
            "chat.user_assigned" => {
                EventPayload::Chat(ChatEvent::UserAssigned(from(payload).map_err(malformed)?))
            }
            "chat.renamed" => EventPayload::Chat(ChatEvent::Renamed(from(payload).map_err(malformed)?)),
            "chat.priority_set" => {
                EventPayload::Chat(ChatEvent::PrioritySet(from(payload).map_err(malformed)?))
            }
            "chat.due_date_set" => {
                EventPayload::Chat(ChatEvent::DueDateSet(from(payload).map_err(malformed)?))
            }
            "chat.severity_set" => {
                EventPayload::Chat(ChatEvent::SeveritySet(from(payload).map_err(malformed)?))
            }
            "chat.closed" => EventPayload::Chat(ChatEvent::Closed(from(payload).map_err(malformed)?)),
            "chat.reopened" => EventPayload::Chat(ChatEvent::Reopened(from(payload).map_err(malformed)?)),
            "chat.deleted" => EventPayload::Chat(ChatEvent::Deleted(from(payload).map_err(malformed)?)),
            "user.created" => EventPayload::User(UserEvent::Created(from(payload).map_err(malformed)?)),
            "user.updated" => EventPayload::User(UserEvent::Updated(from(payload).map_err(malformed)?)),
            "user.admin_rights_changed" => {
                EventPayload::User(UserEvent::AdminRightsChanged(from(payload).map_err(malformed)?))
            }
            "task.created" => EventPayload::Task(TaskEvent::Created(from(payload).map_err(malformed)?)),
            "task.status_changed" => {
                EventPayload::Task(TaskEvent::StatusChanged(from(payload).map_err(malformed)?))
            }
            "task.assignee_changed" => {
                EventPayload::Task(TaskEvent::AssigneeChanged(from(payload).map_err(malformed)?))
            }
            "task.priority_changed" => {
                EventPayload::Task(TaskEvent::PriorityChanged(from(payload).map_err(malformed)?))
            }
            "task.due_date_changed" => {
                EventPayload::Task(TaskEvent::DueDateChanged(from(payload).map_err(malformed)?))
            }
            other => return Err(EventDecodeError::UnknownEventType(other.to_string())),
        };

        Ok(decoded)
    }

    /// Every identifier the registry accepts.
    pub fn registered_types() -> &'static [&'static str] {
        &[
            "chat.created",
            "chat.participant_added",
            "chat.participant_removed",
            "chat.type_changed",
            "chat.status_changed",
            "chat.user_assigned",
            "chat.renamed",
            "chat.priority_set",
            "chat.due_date_set",
            "chat.severity_set",
            "chat.closed",
            "chat.reopened",
            "chat.deleted",
            "user.created",
            "user.updated",
            "user.admin_rights_changed",
            "task.created",
            "task.status_changed",
            "task.assignee_changed",
            "task.priority_changed",
            "task.due_date_changed",
        ]
    }
}

impl From<ChatEvent> for EventPayload {
    fn from(event: ChatEvent) -> Self {
        EventPayload::Chat(event)
    }
}

impl From<UserEvent> for EventPayload {
    fn from(event: UserEvent) -> Self {
        EventPayload::User(event)
    }
}

impl From<TaskEvent> for EventPayload {
    fn from(event: TaskEvent) -> Self {
        EventPayload::Task(event)
    }
}

/// A domain event as it exists in the store: a typed payload plus the
/// envelope attributes the log assigns.
///
/// Immutable once appended. The version is 1-based and strictly
/// sequential within one aggregate.
#[derive(Debug, Clone)]
pub struct DomainEvent {
    pub event_id: EventId,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub version: i64,
    pub occurred_at: Timestamp,
    pub metadata: EventMetadata,
    pub payload: EventPayload,
}

impl DomainEvent {
    /// Stable registry identifier of the payload.
    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    /// Builds the wire envelope for this event.
    pub fn to_envelope(&self) -> Result<EventEnvelope, serde_json::Error> {
        Ok(EventEnvelope {
            event_id: self.event_id,
            event_type: self.event_type().to_string(),
            aggregate_id: self.aggregate_id.clone(),
            aggregate_type: self.aggregate_type.clone(),
            occurred_at: self.occurred_at,
            version: self.version,
            metadata: self.metadata.clone(),
            payload: self.payload.to_json()?,
        })
    }

    /// Rebuilds a domain event from a wire envelope, decoding the payload
    /// through the registry.
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self, EventDecodeError> {
        let payload = EventPayload::decode(&envelope.event_type, &envelope.payload)?;
        Ok(Self {
            event_id: envelope.event_id,
            aggregate_id: envelope.aggregate_id.clone(),
            aggregate_type: envelope.aggregate_type.clone(),
            version: envelope.version,
            occurred_at: envelope.occurred_at,
            metadata: envelope.metadata.clone(),
            payload,
        })
    }
}
