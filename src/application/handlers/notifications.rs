//! Notification consumer.
//!
//! Reacts to participant, assignment, and status events by composing
//! notifications for the affected users. Delivery itself (email, push,
//! socket fan-out) is the external `NotificationSender`'s problem.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::domain::chat::ChatEvent;
use crate::domain::events::EventPayload;
use crate::domain::foundation::{ChatId, DomainError, ErrorCode, EventEnvelope};
use crate::ports::{ChatReadModel, EventHandler, Notification, NotificationSender};

/// Handler that turns chat events into notifications.
pub struct NotificationHandler {
    sender: Arc<dyn NotificationSender>,
    chats: Arc<dyn ChatReadModel>,
}

impl NotificationHandler {
    pub fn new(sender: Arc<dyn NotificationSender>, chats: Arc<dyn ChatReadModel>) -> Self {
        Self { sender, chats }
    }

    /// Event types this handler subscribes to.
    pub fn event_types() -> &'static [&'static str] {
        &[
            "chat.participant_added",
            "chat.user_assigned",
            "chat.status_changed",
        ]
    }

    async fn chat_title(&self, chat_id: ChatId) -> String {
        match self.chats.find(chat_id).await {
            Ok(Some(record)) => record.title,
            _ => chat_id.to_string(),
        }
    }
}

#[async_trait]
impl EventHandler for NotificationHandler {
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), DomainError> {
        let chat_id: ChatId = envelope.aggregate_id.parse().map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidFormat,
                format!("malformed aggregate id '{}'", envelope.aggregate_id),
            )
        })?;

        let payload = EventPayload::decode(&envelope.event_type, &envelope.payload)
            .map_err(|err| DomainError::new(ErrorCode::UnknownEventType, err.to_string()))?;

        let EventPayload::Chat(event) = payload else {
            return Ok(());
        };

        let title = self.chat_title(chat_id).await;
        let notification = match event {
            ChatEvent::ParticipantAdded(e) => Some(Notification {
                recipient: e.user_id,
                title: format!("Added to \"{}\"", title),
                body: "You were added to the conversation.".to_string(),
            }),
            ChatEvent::UserAssigned(e) => e.assignee.map(|assignee| Notification {
                recipient: assignee,
                title: format!("Assigned: \"{}\"", title),
                body: "This work item was assigned to you.".to_string(),
            }),
            ChatEvent::StatusChanged(e) => {
                // Status moves notify the current assignee, when there is
                // one and the move was made by someone else.
                match self.chats.find(chat_id).await? {
                    Some(record) => record.assignee.and_then(|assignee| {
                        if envelope.metadata.user_id == Some(assignee) {
                            None
                        } else {
                            Some(Notification {
                                recipient: assignee,
                                title: format!("Status of \"{}\"", title),
                                body: format!("Status changed to {}.", e.new_status),
                            })
                        }
                    }),
                    None => None,
                }
            }
            _ => None,
        };

        if let Some(notification) = notification {
            debug!(
                recipient = %notification.recipient,
                event_type = %envelope.event_type,
                "Sending notification"
            );
            self.sender.notify(notification).await?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "NotificationHandler"
    }
}
