//! Event-sourced implementation of the chat repository.
//!
//! Load folds the stored log into a fresh aggregate; save appends the
//! uncommitted buffer at the version the aggregate was loaded at. The
//! reducer used for both paths is the aggregate's own `apply`, so a
//! reloaded chat and a just-mutated one are always reached identically.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::domain::chat::{Chat, ChatEvent};
use crate::domain::events::{DomainEvent, EventPayload};
use crate::domain::foundation::{ChatId, EventMetadata};
use crate::ports::{ChatRepository, EventStore, EventStoreError};

/// Chat repository over any event store.
pub struct EventSourcedChatRepository {
    store: Arc<dyn EventStore>,
}

impl EventSourcedChatRepository {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ChatRepository for EventSourcedChatRepository {
    async fn load(&self, id: ChatId) -> Result<Chat, EventStoreError> {
        let stored = self.store.load(id).await?;
        let version = stored.last().map(|e| e.version).unwrap_or(0);

        let mut events = Vec::with_capacity(stored.len());
        for event in stored {
            match event.payload {
                EventPayload::Chat(chat_event) => events.push(chat_event),
                other => {
                    // A chat log can only hold chat events; anything else
                    // means the store was corrupted out of band.
                    return Err(EventStoreError::Backend(format!(
                        "aggregate {} contains foreign event '{}'",
                        id,
                        other.event_type()
                    )));
                }
            }
        }

        Ok(Chat::replay(id, events, version))
    }

    async fn save(
        &self,
        chat: &mut Chat,
        metadata: EventMetadata,
    ) -> Result<Vec<DomainEvent>, EventStoreError> {
        let uncommitted: Vec<ChatEvent> = chat.uncommitted_events().to_vec();
        if uncommitted.is_empty() {
            debug!(chat_id = %chat.id(), "Save with no uncommitted events is a no-op");
            return Ok(Vec::new());
        }

        let expected_version = chat.persisted_version();
        let payloads = uncommitted.into_iter().map(EventPayload::Chat).collect();

        // On conflict the buffer is untouched; the caller reloads and
        // reapplies its command.
        let stored = self
            .store
            .append(chat.id(), payloads, expected_version, metadata)
            .await?;

        let new_version = stored.last().map(|e| e.version).unwrap_or(expected_version);
        chat.mark_committed(new_version);
        Ok(stored)
    }
}
