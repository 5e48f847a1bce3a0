//! UserDirectory port - username resolution.
//!
//! The directory itself is synced by an external service; this port only
//! reads it. The command executor resolves `@username` references here
//! before commands reach the aggregate, so everything downstream works
//! with user ids.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};

/// A directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub is_admin: bool,
}

/// Port for looking up users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Finds a user by username (without the leading `@`).
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, DomainError>;

    /// Finds a user by id.
    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, DomainError>;
}
