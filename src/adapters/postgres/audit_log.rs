//! PostgreSQL adapter for the audit trail.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{AuditLog, AuditRecord};

fn database(err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, err.to_string())
}

/// PostgreSQL-backed audit log. Append-only.
#[derive(Clone)]
pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    async fn append(&self, record: AuditRecord) -> Result<(), DomainError> {
        // The audit handler is idempotency-wrapped, but a conflict clause
        // keeps replays harmless even without it.
        sqlx::query(
            r#"
            INSERT INTO audit_log (
                event_id, event_type, aggregate_id, user_id, occurred_at, payload
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(record.event_id.as_uuid())
        .bind(&record.event_type)
        .bind(&record.aggregate_id)
        .bind(record.user_id.map(|u| *u.as_uuid()))
        .bind(record.occurred_at.as_datetime())
        .bind(&record.payload)
        .execute(&self.pool)
        .await
        .map_err(database)?;

        Ok(())
    }
}
