//! ProcessedEventStore port - idempotency tracking for event handlers.
//!
//! Delivery is at-least-once: events can be redelivered after worker
//! crashes, bus retries, or broker hiccups. Each handler records the
//! events it has finished, keyed by `(event_id, handler_name)`, so a
//! redelivery is recognized and skipped.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventId, Timestamp};

/// Port for tracking which events each handler has processed.
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Whether the handler has already processed this event.
    async fn contains(&self, event_id: &EventId, handler_name: &str) -> Result<bool, DomainError>;

    /// Records a successful processing. Called only after the handler
    /// finished without error.
    async fn mark_processed(
        &self,
        event_id: &EventId,
        handler_name: &str,
    ) -> Result<(), DomainError>;

    /// Deletes records older than the cutoff. Returns the number of rows
    /// removed.
    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError>;
}
