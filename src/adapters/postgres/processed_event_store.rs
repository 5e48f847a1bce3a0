//! PostgreSQL adapter for processed-event tracking.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, EventId, Timestamp};
use crate::ports::ProcessedEventStore;

fn database(err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, err.to_string())
}

/// PostgreSQL-backed processed-event store.
#[derive(Clone)]
pub struct PostgresProcessedEventStore {
    pool: PgPool,
}

impl PostgresProcessedEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessedEventStore for PostgresProcessedEventStore {
    async fn contains(&self, event_id: &EventId, handler_name: &str) -> Result<bool, DomainError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM processed_events
                WHERE event_id = $1 AND handler = $2
            )
            "#,
        )
        .bind(event_id.as_uuid())
        .bind(handler_name)
        .fetch_one(&self.pool)
        .await
        .map_err(database)?;

        Ok(exists)
    }

    async fn mark_processed(
        &self,
        event_id: &EventId,
        handler_name: &str,
    ) -> Result<(), DomainError> {
        // Racing duplicates may both reach this insert; the conflict
        // clause keeps the second one harmless.
        sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, handler, processed_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (event_id, handler) DO NOTHING
            "#,
        )
        .bind(event_id.as_uuid())
        .bind(handler_name)
        .execute(&self.pool)
        .await
        .map_err(database)?;

        Ok(())
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM processed_events WHERE processed_at < $1")
            .bind(cutoff.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(database)?;

        Ok(result.rows_affected())
    }
}
