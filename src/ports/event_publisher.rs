//! EventPublisher port - interface for publishing domain events.
//!
//! The publisher delivers envelopes to the broker without knowing who
//! listens. Delivery is at-least-once end to end: handlers may see
//! duplicates and must be idempotent on the event id.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::EventEnvelope;

/// Errors from the event bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// Subscribe was called with an empty event type.
    #[error("event type cannot be empty")]
    EmptyEventType,

    /// The receive loop was started a second time.
    #[error("event bus is already started")]
    AlreadyStarted,

    #[error("broker connection error: {0}")]
    Connection(String),

    #[error("envelope serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Port for publishing domain events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes a single envelope to the channel of its event type.
    async fn publish(&self, event: EventEnvelope) -> Result<(), BusError>;

    /// Publishes multiple envelopes sequentially, stopping at the first
    /// failure.
    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), BusError>;
}
