//! PostgreSQL outbox adapter.
//!
//! Rows are inserted by the event store inside its append transaction;
//! this adapter owns the worker-facing side: polling, acknowledgement,
//! and retention. Poll order is `created_at` with the insertion-ordered
//! `position` column as tiebreaker, because rows written in one
//! transaction can share a timestamp at microsecond resolution and
//! per-aggregate version order must survive the poll.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::events::DomainEvent;
use crate::domain::foundation::{EventId, Timestamp};
use crate::ports::{Outbox, OutboxEntry, OutboxError, OutboxStats};

fn backend(err: sqlx::Error) -> OutboxError {
    OutboxError::Backend(err.to_string())
}

type OutboxRow = (
    Uuid,
    Uuid,
    String,
    String,
    String,
    Vec<u8>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    i32,
    Option<String>,
);

fn row_to_entry(row: OutboxRow) -> OutboxEntry {
    let (id, event_id, event_type, aggregate_id, aggregate_type, payload, created_at, processed_at, retry_count, last_error) =
        row;
    OutboxEntry {
        id,
        event_id: EventId::from_uuid(event_id),
        event_type,
        aggregate_id,
        aggregate_type,
        payload,
        created_at: Timestamp::from_datetime(created_at),
        processed_at: processed_at.map(Timestamp::from_datetime),
        retry_count,
        last_error,
    }
}

/// PostgreSQL-backed outbox.
#[derive(Clone)]
pub struct PostgresOutbox {
    pool: PgPool,
}

impl PostgresOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, entry: &OutboxEntry) -> Result<(), OutboxError> {
        sqlx::query(
            r#"
            INSERT INTO outbox (
                id, event_id, event_type, aggregate_id, aggregate_type,
                payload, created_at, retry_count
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 0)
            "#,
        )
        .bind(entry.id)
        .bind(entry.event_id.as_uuid())
        .bind(&entry.event_type)
        .bind(&entry.aggregate_id)
        .bind(&entry.aggregate_type)
        .bind(&entry.payload)
        .bind(entry.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl Outbox for PostgresOutbox {
    async fn add(&self, event: &DomainEvent) -> Result<(), OutboxError> {
        let entry = OutboxEntry::from_event(event)?;
        self.insert(&entry).await
    }

    async fn add_batch(&self, events: &[DomainEvent]) -> Result<(), OutboxError> {
        for event in events {
            self.add(event).await?;
        }
        Ok(())
    }

    async fn poll(&self, batch_size: u32) -> Result<Vec<OutboxEntry>, OutboxError> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            r#"
            SELECT id, event_id, event_type, aggregate_id, aggregate_type,
                   payload, created_at, processed_at, retry_count, last_error
            FROM outbox
            WHERE processed_at IS NULL
            ORDER BY created_at ASC, position ASC
            LIMIT $1
            "#,
        )
        .bind(batch_size as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.into_iter().map(row_to_entry).collect())
    }

    async fn mark_processed(&self, entry_id: Uuid) -> Result<(), OutboxError> {
        let result = sqlx::query("UPDATE outbox SET processed_at = NOW() WHERE id = $1")
            .bind(entry_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(OutboxError::EntryNotFound(entry_id));
        }
        Ok(())
    }

    async fn mark_failed(&self, entry_id: Uuid, error: &str) -> Result<(), OutboxError> {
        let result = sqlx::query(
            r#"
            UPDATE outbox
            SET retry_count = retry_count + 1, last_error = $2
            WHERE id = $1
            "#,
        )
        .bind(entry_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(OutboxError::EntryNotFound(entry_id));
        }
        Ok(())
    }

    async fn cleanup(&self, older_than: std::time::Duration) -> Result<u64, OutboxError> {
        let cutoff = Timestamp::now().minus_duration(older_than);
        let result = sqlx::query(
            "DELETE FROM outbox WHERE processed_at IS NOT NULL AND processed_at < $1",
        )
        .bind(cutoff.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64, OutboxError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE processed_at IS NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
        Ok(count as u64)
    }

    async fn stats(&self) -> Result<OutboxStats, OutboxError> {
        let (pending, oldest): (i64, Option<DateTime<Utc>>) = sqlx::query_as(
            "SELECT COUNT(*), MIN(created_at) FROM outbox WHERE processed_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        Ok(OutboxStats {
            pending: pending as u64,
            oldest_pending_at: oldest.map(Timestamp::from_datetime),
        })
    }
}
