//! Event transport primitives: metadata and the wire envelope.
//!
//! The envelope is the only shape that crosses process boundaries. It is
//! produced when an event is published, stored verbatim in the outbox
//! payload, and decoded back by subscribers. Typed payloads live in
//! `crate::domain::events`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{EventId, Timestamp, UserId};

/// Tracing and correlation context attached to every event.
///
/// - `correlation_id` links events caused by a single user request
/// - `causation_id` names the event (or command) that directly caused this one
/// - `ip_address` / `user_agent` are carried for the audit trail only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// User who initiated the action, absent for system-originated events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    /// ID linking related events across a single request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// ID of the event that directly caused this event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,

    /// When the causing action was observed.
    pub timestamp: Timestamp,

    /// Originating client address, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// Originating client user agent, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl EventMetadata {
    /// Creates metadata for an action initiated by the given user.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    /// Creates metadata for a system-originated action.
    pub fn system() -> Self {
        Self::default()
    }

    /// Sets the correlation ID.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Sets the causation ID.
    pub fn with_causation_id(mut self, id: impl Into<String>) -> Self {
        self.causation_id = Some(id.into());
        self
    }

    /// Sets the client address.
    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Sets the client user agent.
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self {
            user_id: None,
            correlation_id: None,
            causation_id: None,
            timestamp: Timestamp::now(),
            ip_address: None,
            user_agent: None,
        }
    }
}

/// Wire envelope for domain events.
///
/// Serialized as JSON onto bus channels and into outbox payloads. The
/// payload holds the event-type-specific fields verbatim; routing happens
/// on `event_type` alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique ID for this event instance.
    #[serde(rename = "id")]
    pub event_id: EventId,

    /// Event type for routing (e.g., "chat.status_changed").
    pub event_type: String,

    /// ID of the aggregate that emitted this event.
    pub aggregate_id: String,

    /// Type of aggregate (e.g., "Chat").
    pub aggregate_type: String,

    /// When the event occurred.
    pub occurred_at: Timestamp,

    /// 1-based position of this event in its aggregate's log.
    pub version: i64,

    /// Tracing and correlation metadata.
    pub metadata: EventMetadata,

    /// Event-type-specific payload as JSON.
    pub payload: JsonValue,
}

impl EventEnvelope {
    /// Deserializes the payload into a specific type.
    pub fn payload_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[cfg(test)]
impl EventEnvelope {
    /// Creates a test fixture envelope.
    pub fn test_fixture(event_type: &str, aggregate_id: &str) -> Self {
        Self {
            event_id: EventId::new(),
            event_type: event_type.to_string(),
            aggregate_id: aggregate_id.to_string(),
            aggregate_type: "Chat".to_string(),
            occurred_at: Timestamp::now(),
            version: 1,
            metadata: EventMetadata::default(),
            payload: serde_json::json!({}),
        }
    }
}
