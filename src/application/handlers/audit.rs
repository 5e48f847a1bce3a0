//! Audit trail consumer.
//!
//! Appends every chat event to the audit log verbatim: who did what, to
//! which chat, when, with the raw payload retained for inspection.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::{AuditLog, AuditRecord, EventHandler};

/// Handler that records every chat event in the audit trail.
pub struct AuditLogHandler {
    log: Arc<dyn AuditLog>,
}

impl AuditLogHandler {
    pub fn new(log: Arc<dyn AuditLog>) -> Self {
        Self { log }
    }

    /// Event types this handler subscribes to.
    pub fn event_types() -> &'static [&'static str] {
        super::ChatProjectionHandler::event_types()
    }
}

#[async_trait]
impl EventHandler for AuditLogHandler {
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), DomainError> {
        self.log
            .append(AuditRecord {
                event_id: envelope.event_id,
                event_type: envelope.event_type,
                aggregate_id: envelope.aggregate_id,
                user_id: envelope.metadata.user_id,
                occurred_at: envelope.occurred_at,
                payload: envelope.payload,
            })
            .await
    }

    fn name(&self) -> &'static str {
        "AuditLogHandler"
    }
}
