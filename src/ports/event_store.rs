//! EventStore port - the append-only per-aggregate event log.
//!
//! The store is the single writer of the canonical log. Optimistic
//! concurrency is enforced at append time: the caller states the version
//! it loaded, and the append fails with `ConcurrencyConflict` if the log
//! has moved. Implementations must make the append all-or-nothing and
//! must enqueue one outbox entry per event inside the same transaction -
//! that co-write is what makes downstream delivery reliable without a
//! distributed transaction.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::events::{DomainEvent, EventDecodeError, EventPayload};
use crate::domain::foundation::{ChatId, EventMetadata};

/// Errors from the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The log moved past the caller's expected version. Retryable: the
    /// caller reloads and reapplies.
    #[error("concurrency conflict on {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        aggregate_id: ChatId,
        expected: i64,
        actual: i64,
    },

    /// No events exist for the aggregate.
    #[error("aggregate {0} not found")]
    AggregateNotFound(ChatId),

    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored record failed registry decoding. Fatal for that record.
    #[error("stored event is unreadable: {0}")]
    Decode(#[from] EventDecodeError),

    /// Transient backend failure; safe to retry, a retry that already
    /// committed surfaces as `ConcurrencyConflict`.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl EventStoreError {
    /// Whether this error is an optimistic-lock failure.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrencyConflict { .. })
    }
}

/// Port for the durable event log.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events at versions `expected_version + 1 ..=
    /// expected_version + n`, atomically, co-writing one outbox entry per
    /// event.
    ///
    /// Returns the stored events with their assigned versions. An empty
    /// batch is a no-op and returns an empty vector without touching the
    /// backend.
    async fn append(
        &self,
        aggregate_id: ChatId,
        events: Vec<EventPayload>,
        expected_version: i64,
        metadata: EventMetadata,
    ) -> Result<Vec<DomainEvent>, EventStoreError>;

    /// Loads all events of an aggregate, ascending by version.
    ///
    /// # Errors
    ///
    /// - `AggregateNotFound` when no events exist
    async fn load(&self, aggregate_id: ChatId) -> Result<Vec<DomainEvent>, EventStoreError>;

    /// Returns the current version of an aggregate, 0 if unknown.
    async fn current_version(&self, aggregate_id: ChatId) -> Result<i64, EventStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn EventStore) {}

    #[test]
    fn concurrency_conflict_is_recognizable() {
        let err = EventStoreError::ConcurrencyConflict {
            aggregate_id: ChatId::new(),
            expected: 3,
            actual: 4,
        };
        assert!(err.is_concurrency_conflict());
        assert!(!EventStoreError::Backend("timeout".into()).is_concurrency_conflict());
    }

    #[test]
    fn conflict_message_names_both_versions() {
        let err = EventStoreError::ConcurrencyConflict {
            aggregate_id: ChatId::new(),
            expected: 3,
            actual: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("expected version 3"));
        assert!(msg.contains("found 5"));
    }
}
