//! In-memory event bus for testing.
//!
//! Delivers synchronously on `publish`, in subscription order, which
//! keeps unit tests deterministic. Production code uses the Redis bus;
//! this adapter panics on poisoned locks, which is acceptable only in
//! tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::foundation::EventEnvelope;
use crate::ports::{BusError, EventHandler, EventPublisher, EventSubscriber};

/// In-memory event bus.
///
/// Captures every published envelope for assertions, and invokes
/// registered handlers inline. Handler errors are logged to the captured
/// list but do not fail `publish` - mirroring the real bus, where
/// delivery to handlers is decoupled from the publisher.
pub struct InMemoryEventBus {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
    published: RwLock<Vec<EventEnvelope>>,
    handler_errors: RwLock<Vec<(String, String)>>,
}

impl InMemoryEventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            published: RwLock::new(Vec::new()),
            handler_errors: RwLock::new(Vec::new()),
        }
    }

    // === Test helpers ===

    /// All published envelopes, in publish order.
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.published
            .read()
            .expect("InMemoryEventBus: published lock poisoned")
            .clone()
    }

    /// Published envelopes of one type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// Published envelopes of one aggregate.
    pub fn events_for_aggregate(&self, aggregate_id: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .collect()
    }

    /// Number of published envelopes.
    pub fn event_count(&self) -> usize {
        self.published
            .read()
            .expect("InMemoryEventBus: published lock poisoned")
            .len()
    }

    /// Whether an event of this type was published.
    pub fn has_event(&self, event_type: &str) -> bool {
        self.published
            .read()
            .expect("InMemoryEventBus: published lock poisoned")
            .iter()
            .any(|e| e.event_type == event_type)
    }

    /// Handler failures captured during dispatch, as (handler, error).
    pub fn handler_errors(&self) -> Vec<(String, String)> {
        self.handler_errors
            .read()
            .expect("InMemoryEventBus: errors lock poisoned")
            .clone()
    }

    /// Clears captured events and errors.
    pub fn clear(&self) {
        self.published
            .write()
            .expect("InMemoryEventBus: published lock poisoned")
            .clear();
        self.handler_errors
            .write()
            .expect("InMemoryEventBus: errors lock poisoned")
            .clear();
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), BusError> {
        self.published
            .write()
            .expect("InMemoryEventBus: published lock poisoned")
            .push(event.clone());

        // Copy handlers out before any await point.
        let matching: Vec<Arc<dyn EventHandler>> = {
            let handlers = self
                .handlers
                .read()
                .expect("InMemoryEventBus: handlers lock poisoned");
            handlers.get(&event.event_type).cloned().unwrap_or_default()
        };

        for handler in matching {
            if let Err(err) = handler.handle(event.clone()).await {
                self.handler_errors
                    .write()
                    .expect("InMemoryEventBus: errors lock poisoned")
                    .push((handler.name().to_string(), err.to_string()));
            }
        }

        Ok(())
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), BusError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

impl EventSubscriber for InMemoryEventBus {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) -> Result<(), BusError> {
        if event_type.is_empty() {
            return Err(BusError::EmptyEventType);
        }

        self.handlers
            .write()
            .expect("InMemoryEventBus: handlers lock poisoned")
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
        Ok(())
    }
}
