//! User directory events.
//!
//! These events originate from the user-directory sync, which lives
//! outside this service. They are registered here so stored and relayed
//! records deserialize into typed form like every other event.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::UserId;

/// A user account was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreated {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A user profile changed. Absent fields were left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUpdated {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A user's admin flag was toggled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminRightsChanged {
    pub user_id: UserId,
    pub is_admin: bool,
}

/// All user-directory events.
#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    Created(UserCreated),
    Updated(UserUpdated),
    AdminRightsChanged(AdminRightsChanged),
}

impl UserEvent {
    /// Stable registry identifier for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Created(_) => "user.created",
            UserEvent::Updated(_) => "user.updated",
            UserEvent::AdminRightsChanged(_) => "user.admin_rights_changed",
        }
    }

    /// Serializes the event-specific fields, without any type tag.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            UserEvent::Created(e) => serde_json::to_value(e),
            UserEvent::Updated(e) => serde_json::to_value(e),
            UserEvent::AdminRightsChanged(e) => serde_json::to_value(e),
        }
    }
}
