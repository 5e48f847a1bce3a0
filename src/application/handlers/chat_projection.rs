//! Chat read-model consumer.
//!
//! Keeps the denormalized `chats` view in sync by rebuilding the record
//! from the event log on every chat event. Rebuilding from the log
//! rather than patching fields makes the handler naturally idempotent
//! and immune to delivery order between distinct events. Soft-deleted
//! chats stay in the table but are hidden from listings.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::domain::foundation::{ChatId, DomainError, ErrorCode, EventEnvelope, Timestamp};
use crate::ports::{ChatReadModel, ChatRepository, ChatRecord, EventHandler};

/// Handler that maintains the chat read model.
pub struct ChatProjectionHandler {
    chats: Arc<dyn ChatReadModel>,
    repository: Arc<dyn ChatRepository>,
}

impl ChatProjectionHandler {
    pub fn new(chats: Arc<dyn ChatReadModel>, repository: Arc<dyn ChatRepository>) -> Self {
        Self { chats, repository }
    }

    /// Event types this handler subscribes to.
    pub fn event_types() -> &'static [&'static str] {
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
        ]
    }
}

#[async_trait]
impl EventHandler for ChatProjectionHandler {
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), DomainError> {
        let chat_id: ChatId = envelope.aggregate_id.parse().map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidFormat,
                format!("malformed aggregate id '{}'", envelope.aggregate_id),
            )
        })?;

        let chat = self
            .repository
            .load(chat_id)
            .await
            .map_err(|err| DomainError::new(ErrorCode::DatabaseError, err.to_string()))?;

        let record = ChatRecord {
            chat_id,
            workspace_id: chat.workspace_id(),
            kind: chat.kind(),
            title: chat.title().to_string(),
            status: chat.status().map(str::to_string),
            assignee: chat.assignee(),
            priority: chat.priority(),
            due_date: chat.due_date(),
            severity: chat.severity(),
            closed: chat.is_closed(),
            hidden: chat.is_deleted(),
            updated_at: Timestamp::now(),
        };

        debug!(chat_id = %chat_id, hidden = record.hidden, "Chat read model updated");
        self.chats.upsert(record).await
    }

    fn name(&self) -> &'static str {
        "ChatProjectionHandler"
    }
}
