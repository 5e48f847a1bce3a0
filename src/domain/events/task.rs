//! Task board events.
//!
//! Emitted by the task projection when a chat of a work-item kind
//! changes. The aggregate id of a task event is the chat id it mirrors.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::chat::Priority;
use crate::domain::foundation::{ChatId, UserId, WorkspaceId};

/// A task appeared on the board because a chat was converted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreated {
    pub chat_id: ChatId,
    pub workspace_id: WorkspaceId,
    pub title: String,
    pub status: String,
}

/// The mirrored task moved within its workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusChanged {
    pub chat_id: ChatId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_status: Option<String>,
    pub new_status: String,
}

/// The mirrored task was assigned or unassigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAssigneeChanged {
    pub chat_id: ChatId,
    pub assignee: Option<UserId>,
}

/// The mirrored task's priority changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPriorityChanged {
    pub chat_id: ChatId,
    pub priority: Priority,
}

/// The mirrored task's due date was set or cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDueDateChanged {
    pub chat_id: ChatId,
    pub due_date: Option<NaiveDate>,
}

/// All task board events.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Created(TaskCreated),
    StatusChanged(TaskStatusChanged),
    AssigneeChanged(TaskAssigneeChanged),
    PriorityChanged(TaskPriorityChanged),
    DueDateChanged(TaskDueDateChanged),
}

impl TaskEvent {
    /// Stable registry identifier for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            TaskEvent::Created(_) => "task.created",
            TaskEvent::StatusChanged(_) => "task.status_changed",
            TaskEvent::AssigneeChanged(_) => "task.assignee_changed",
            TaskEvent::PriorityChanged(_) => "task.priority_changed",
            TaskEvent::DueDateChanged(_) => "task.due_date_changed",
        }
    }

    /// Serializes the event-specific fields, without any type tag.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            TaskEvent::Created(e) => serde_json::to_value(e),
            TaskEvent::StatusChanged(e) => serde_json::to_value(e),
            TaskEvent::AssigneeChanged(e) => serde_json::to_value(e),
            TaskEvent::PriorityChanged(e) => serde_json::to_value(e),
            TaskEvent::DueDateChanged(e) => serde_json::to_value(e),
        }
    }
}
