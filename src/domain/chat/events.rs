//! Chat domain events.
//!
//! Each event is a standalone payload struct plus a `ChatEvent` variant.
//! The string identifiers are part of the closed event-type registry
//! (`crate::domain::events`); adding a variant means registering it there.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{UserId, WorkspaceId};

use super::values::{ChatKind, ParticipantRole, Priority, Severity};

/// A chat thread was opened as a Discussion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCreated {
    pub workspace_id: WorkspaceId,
    pub title: String,
    pub created_by: UserId,
}

/// A user joined the chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantAdded {
    pub user_id: UserId,
    pub role: ParticipantRole,
}

/// A user left or was removed from the chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRemoved {
    pub user_id: UserId,
}

/// The Discussion was converted into a work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeChanged {
    pub new_type: ChatKind,
    pub title: String,
}

/// The work-item status moved within its kind's workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChanged {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_status: Option<String>,
    pub new_status: String,
}

/// The work item was assigned or unassigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAssigned {
    /// `None` means the work item is now unassigned.
    pub assignee: Option<UserId>,
}

/// The chat title changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Renamed {
    pub old_title: String,
    pub new_title: String,
}

/// The work-item priority was set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritySet {
    pub priority: Priority,
}

/// The work-item due date was set or cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueDateSet {
    /// `None` clears the due date.
    pub due_date: Option<NaiveDate>,
}

/// The bug severity was set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeveritySet {
    pub severity: Severity,
}

/// The chat was closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatClosed {}

/// A closed chat was reopened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReopened {}

/// The chat was soft-deleted; projections hide it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatDeleted {}

/// All events the chat aggregate can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Created(ChatCreated),
    ParticipantAdded(ParticipantAdded),
    ParticipantRemoved(ParticipantRemoved),
    TypeChanged(TypeChanged),
    StatusChanged(StatusChanged),
    UserAssigned(UserAssigned),
    Renamed(Renamed),
    PrioritySet(PrioritySet),
    DueDateSet(DueDateSet),
    SeveritySet(SeveritySet),
    Closed(ChatClosed),
    Reopened(ChatReopened),
    Deleted(ChatDeleted),
}

impl ChatEvent {
    /// Stable registry identifier for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatEvent::Created(_) => "chat.created",
            ChatEvent::ParticipantAdded(_) => "chat.participant_added",
            ChatEvent::ParticipantRemoved(_) => "chat.participant_removed",
            ChatEvent::TypeChanged(_) => "chat.type_changed",
            ChatEvent::StatusChanged(_) => "chat.status_changed",
            ChatEvent::UserAssigned(_) => "chat.user_assigned",
            ChatEvent::Renamed(_) => "chat.renamed",
            ChatEvent::PrioritySet(_) => "chat.priority_set",
            ChatEvent::DueDateSet(_) => "chat.due_date_set",
            ChatEvent::SeveritySet(_) => "chat.severity_set",
            ChatEvent::Closed(_) => "chat.closed",
            ChatEvent::Reopened(_) => "chat.reopened",
            ChatEvent::Deleted(_) => "chat.deleted",
        }
    }

    /// Serializes the event-specific fields, without any type tag.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            ChatEvent::Created(e) => serde_json::to_value(e),
            ChatEvent::ParticipantAdded(e) => serde_json::to_value(e),
            ChatEvent::ParticipantRemoved(e) => serde_json::to_value(e),
            ChatEvent::TypeChanged(e) => serde_json::to_value(e),
            ChatEvent::StatusChanged(e) => serde_json::to_value(e),
            ChatEvent::UserAssigned(e) => serde_json::to_value(e),
            ChatEvent::Renamed(e) => serde_json::to_value(e),
            ChatEvent::PrioritySet(e) => serde_json::to_value(e),
            ChatEvent::DueDateSet(e) => serde_json::to_value(e),
            ChatEvent::SeveritySet(e) => serde_json::to_value(e),
            ChatEvent::Closed(e) => serde_json::to_value(e),
            ChatEvent::Reopened(e) => serde_json::to_value(e),
            ChatEvent::Deleted(e) => serde_json::to_value(e),
        }
    }
}
