//! PostgreSQL adapter for the user directory.
//!
//! The `users` table is populated by the external directory sync; this
//! adapter only reads it.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::{UserDirectory, UserRecord};

fn database(err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, err.to_string())
}

type UserRow = (Uuid, String, Option<String>, bool);

fn row_to_record(row: UserRow) -> UserRecord {
    let (id, username, display_name, is_admin) = row;
    UserRecord {
        user_id: UserId::from_uuid(id),
        username,
        display_name,
        is_admin,
    }
}

/// PostgreSQL-backed user directory.
#[derive(Clone)]
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, display_name, is_admin FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(database)?;

        Ok(row.map(row_to_record))
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, display_name, is_admin FROM users WHERE id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(database)?;

        Ok(row.map(row_to_record))
    }
}
