//! Read-model ports maintained by the event consumers.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use crate::domain::chat::{ChatKind, Priority, Severity};
use crate::domain::foundation::{ChatId, DomainError, EventId, Timestamp, UserId, WorkspaceId};

/// Denormalized view of one chat for listing and lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRecord {
    pub chat_id: ChatId,
    pub workspace_id: WorkspaceId,
    pub kind: ChatKind,
    pub title: String,
    pub status: Option<String>,
    pub assignee: Option<UserId>,
    pub priority: Option<Priority>,
    pub due_date: Option<NaiveDate>,
    pub severity: Option<Severity>,
    pub closed: bool,
    /// Soft-deleted chats are hidden, never removed.
    pub hidden: bool,
    pub updated_at: Timestamp,
}

/// Port for the chat read model.
#[async_trait]
pub trait ChatReadModel: Send + Sync {
    /// Inserts or replaces a chat record.
    async fn upsert(&self, record: ChatRecord) -> Result<(), DomainError>;

    /// Finds a record, hidden ones included.
    async fn find(&self, chat_id: ChatId) -> Result<Option<ChatRecord>, DomainError>;

    /// Marks a record hidden.
    async fn hide(&self, chat_id: ChatId) -> Result<(), DomainError>;

    /// Lists visible chats in a workspace, most recently updated first.
    async fn list_visible(&self, workspace_id: WorkspaceId)
        -> Result<Vec<ChatRecord>, DomainError>;
}

/// One card on the task board, mirroring a work-item chat.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskCard {
    pub chat_id: ChatId,
    pub workspace_id: WorkspaceId,
    pub title: String,
    pub status: String,
    pub assignee: Option<UserId>,
    pub priority: Option<Priority>,
    pub due_date: Option<NaiveDate>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Port for the task board projection.
#[async_trait]
pub trait TaskBoard: Send + Sync {
    /// Inserts or replaces a card.
    async fn upsert(&self, card: TaskCard) -> Result<(), DomainError>;

    /// Finds the card for a chat.
    async fn find(&self, chat_id: ChatId) -> Result<Option<TaskCard>, DomainError>;
}

/// One line of the audit trail.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub event_id: EventId,
    pub event_type: String,
    pub aggregate_id: String,
    pub user_id: Option<UserId>,
    pub occurred_at: Timestamp,
    pub payload: JsonValue,
}

/// Port for the append-only audit trail.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Appends one record.
    async fn append(&self, record: AuditRecord) -> Result<(), DomainError>;
}

/// A notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: UserId,
    pub title: String,
    pub body: String,
}

/// Port for handing notifications to the delivery infrastructure.
///
/// Actual channels (email, push, websocket fan-out) live outside this
/// service.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Queues one notification for delivery.
    async fn notify(&self, notification: Notification) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(
        _: &dyn ChatReadModel,
        _: &dyn TaskBoard,
        _: &dyn AuditLog,
        _: &dyn NotificationSender,
    ) {
    }
}
