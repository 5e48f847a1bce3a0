//! EventSubscriber port - interface for consuming domain events.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope};

use super::event_publisher::{BusError, EventPublisher};

/// Handler for processing domain events.
///
/// Implementations should be:
/// - **Idempotent** - the pipeline guarantees at-least-once delivery,
///   so the same event may arrive more than once
/// - **Isolated** - a failing handler never affects delivery to others;
///   the bus retries it independently
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Processes one event.
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Handler name for logging, metrics, and idempotency tracking.
    fn name(&self) -> &'static str;
}

/// Port for registering interest in event types.
pub trait EventSubscriber: Send + Sync {
    /// Subscribes a handler to one event type.
    ///
    /// Multiple handlers per type are permitted; each receives the event
    /// independently.
    ///
    /// # Errors
    ///
    /// - `EmptyEventType` when the type string is empty
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) -> Result<(), BusError>;

    /// Subscribes the same handler to several event types.
    fn subscribe_all(
        &self,
        event_types: &[&str],
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), BusError> {
        for event_type in event_types {
            self.subscribe(event_type, Arc::clone(&handler))?;
        }
        Ok(())
    }
}

/// Combined trait for event bus implementations.
pub trait EventBus: EventPublisher + EventSubscriber {}

// Blanket implementation - any type with both halves is a bus.
impl<T: EventPublisher + EventSubscriber> EventBus for T {}
