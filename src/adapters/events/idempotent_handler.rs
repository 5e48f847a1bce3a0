//! Idempotency wrapper for event handlers.
//!
//! Decorates any `EventHandler` with processed-event tracking keyed on
//! `(event_id, handler_name)`. A redelivered event is recognized and
//! skipped; a failed event is never marked, so the next delivery retries
//! it.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::{EventHandler, ProcessedEventStore};

/// Wrapper ensuring the inner handler processes each event at most once.
pub struct IdempotentHandler<H: EventHandler> {
    inner: H,
    processed_events: Arc<dyn ProcessedEventStore>,
}

impl<H: EventHandler> IdempotentHandler<H> {
    /// Wraps a handler with idempotency tracking.
    pub fn new(inner: H, processed_events: Arc<dyn ProcessedEventStore>) -> Self {
        Self {
            inner,
            processed_events,
        }
    }
}

#[async_trait]
impl<H: EventHandler + 'static> EventHandler for IdempotentHandler<H> {
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), DomainError> {
        let handler_name = self.inner.name();

        if self
            .processed_events
            .contains(&envelope.event_id, handler_name)
            .await?
        {
            debug!(
                event_id = %envelope.event_id,
                handler = handler_name,
                "Skipping duplicate delivery"
            );
            return Ok(());
        }

        self.inner.handle(envelope.clone()).await?;

        // Only a successful handling is recorded; failures stay
        // retryable.
        self.processed_events
            .mark_processed(&envelope.event_id, handler_name)
            .await?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
