//! ChatRepository port - loading and saving the chat aggregate.
//!
//! Aggregates are short-lived projections of the event log: a load
//! produces a fresh instance for the duration of one command, and a save
//! appends exactly the events that command recorded.

use async_trait::async_trait;

use crate::domain::chat::Chat;
use crate::domain::events::DomainEvent;
use crate::domain::foundation::{ChatId, EventMetadata};

use super::event_store::EventStoreError;

/// Port for the event-sourced chat repository.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Loads a chat by folding its event log.
    ///
    /// # Errors
    ///
    /// - `AggregateNotFound` when the chat has no events
    async fn load(&self, id: ChatId) -> Result<Chat, EventStoreError>;

    /// Appends the aggregate's uncommitted events at the version it was
    /// loaded at.
    ///
    /// On success the buffer is cleared and the aggregate's version
    /// advances; the stored events are returned. On
    /// `ConcurrencyConflict` the buffer is preserved so the caller can
    /// reload and reapply. Saving with an empty buffer is a no-op.
    async fn save(
        &self,
        chat: &mut Chat,
        metadata: EventMetadata,
    ) -> Result<Vec<DomainEvent>, EventStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn ChatRepository) {}
}
