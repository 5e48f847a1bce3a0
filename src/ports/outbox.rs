//! Outbox port - durable staging of events for reliable publishing.
//!
//! Entries are written in the same transaction as the events they mirror
//! (the event-store adapters own that co-write) and stay pending until
//! the outbox worker publishes them. An entry whose retries are
//! exhausted is still marked processed so it drains instead of cycling
//! forever; its last error is retained for inspection.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::DomainEvent;
use crate::domain::foundation::{EventEnvelope, EventId, Timestamp};

/// Errors from the outbox.
#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("outbox entry {0} not found")]
    EntryNotFound(Uuid),

    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// One staged event awaiting publication.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    /// Unique identifier of this outbox row.
    pub id: Uuid,
    pub event_id: EventId,
    pub event_type: String,
    pub aggregate_id: String,
    pub aggregate_type: String,
    /// Serialized wire envelope, opaque to the outbox itself.
    pub payload: Vec<u8>,
    pub created_at: Timestamp,
    /// Set once the entry left the pending state, successfully or not.
    pub processed_at: Option<Timestamp>,
    pub retry_count: i32,
    pub last_error: Option<String>,
}

impl OutboxEntry {
    /// Stages a domain event: the payload is its full wire envelope.
    pub fn from_event(event: &DomainEvent) -> Result<Self, serde_json::Error> {
        let envelope = event.to_envelope()?;
        Ok(Self {
            id: Uuid::new_v4(),
            event_id: event.event_id,
            event_type: event.event_type().to_string(),
            aggregate_id: event.aggregate_id.clone(),
            aggregate_type: event.aggregate_type.clone(),
            payload: serde_json::to_vec(&envelope)?,
            created_at: event.occurred_at,
            processed_at: None,
            retry_count: 0,
            last_error: None,
        })
    }

    /// Deserializes the staged envelope back out of the payload bytes.
    pub fn envelope(&self) -> Result<EventEnvelope, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    /// Whether the entry still awaits publication.
    pub fn is_pending(&self) -> bool {
        self.processed_at.is_none()
    }

    /// Marks the entry processed.
    pub fn mark_processed(&mut self) {
        self.processed_at = Some(Timestamp::now());
    }

    /// Records a failed publish attempt; the entry stays pending.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.retry_count += 1;
        self.last_error = Some(error.into());
    }
}

/// Aggregate counters for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboxStats {
    pub pending: u64,
    pub oldest_pending_at: Option<Timestamp>,
}

/// Port for the durable outbox table.
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Stages one event.
    async fn add(&self, event: &DomainEvent) -> Result<(), OutboxError>;

    /// Stages a batch of events, preserving their order.
    async fn add_batch(&self, events: &[DomainEvent]) -> Result<(), OutboxError>;

    /// Returns pending entries, oldest first. Same-transaction batches
    /// come back in insertion order, which preserves per-aggregate
    /// version order; no cross-aggregate order is promised.
    async fn poll(&self, batch_size: u32) -> Result<Vec<OutboxEntry>, OutboxError>;

    /// Marks an entry as processed.
    async fn mark_processed(&self, entry_id: Uuid) -> Result<(), OutboxError>;

    /// Records a failed publish attempt: increments the retry count and
    /// stores the error. The entry stays pending.
    async fn mark_failed(&self, entry_id: Uuid, error: &str) -> Result<(), OutboxError>;

    /// Deletes processed entries older than the cutoff. Returns the
    /// number of rows removed.
    async fn cleanup(&self, older_than: std::time::Duration) -> Result<u64, OutboxError>;

    /// Number of pending entries.
    async fn count(&self) -> Result<u64, OutboxError>;

    /// Pending count plus the timestamp of the oldest pending entry.
    async fn stats(&self) -> Result<OutboxStats, OutboxError>;
}
