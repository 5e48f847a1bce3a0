//! PostgreSQL event store with the transactional outbox co-write.
//!
//! One append is one transaction: version check, event inserts, and one
//! outbox insert per event all commit or roll back together. That
//! co-write is the invariant that makes downstream delivery reliable
//! without a distributed transaction. The unique index on
//! `(aggregate_id, version)` backs the optimistic lock: a duplicate-key
//! violation means another writer committed first and is reported as a
//! concurrency conflict.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::events::{DomainEvent, EventPayload};
use crate::domain::foundation::{ChatId, EventId, EventMetadata, Timestamp};
use crate::ports::{EventStore, EventStoreError, OutboxEntry};

fn backend(err: sqlx::Error) -> EventStoreError {
    EventStoreError::Backend(err.to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

/// PostgreSQL-backed event store.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn version_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: ChatId,
    ) -> Result<i64, EventStoreError> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM chat_events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&mut **tx)
                .await
                .map_err(backend)?;
        Ok(version.unwrap_or(0))
    }

    async fn insert_event(
        tx: &mut Transaction<'_, Postgres>,
        event: &DomainEvent,
        aggregate_id: ChatId,
    ) -> Result<(), EventStoreError> {
        let data = event.payload.to_json()?;
        let metadata = serde_json::to_value(&event.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO chat_events (
                id, aggregate_id, aggregate_type, event_type,
                version, data, metadata, occurred_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.event_id.as_uuid())
        .bind(aggregate_id.as_uuid())
        .bind(&event.aggregate_type)
        .bind(event.event_type())
        .bind(event.version)
        .bind(&data)
        .bind(&metadata)
        .bind(event.occurred_at.as_datetime())
        .execute(&mut **tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                // Another writer claimed this version between our read
                // and the insert.
                EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected: event.version - 1,
                    actual: event.version,
                }
            } else {
                backend(err)
            }
        })?;

        Ok(())
    }

    async fn insert_outbox_entry(
        tx: &mut Transaction<'_, Postgres>,
        entry: &OutboxEntry,
    ) -> Result<(), EventStoreError> {
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
        .execute(&mut **tx)
        .await
        .map_err(backend)?;

        Ok(())
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(
        &self,
        aggregate_id: ChatId,
        events: Vec<EventPayload>,
        expected_version: i64,
        metadata: EventMetadata,
    ) -> Result<Vec<DomainEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await.map_err(backend)?;

        let current = Self::version_in_tx(&mut tx, aggregate_id).await?;
        if current != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual: current,
            });
        }

        let mut stored = Vec::with_capacity(events.len());
        for (offset, payload) in events.into_iter().enumerate() {
            let event = DomainEvent {
                event_id: EventId::new(),
                aggregate_id: aggregate_id.to_string(),
                aggregate_type: payload.aggregate_type().to_string(),
                version: expected_version + 1 + offset as i64,
                occurred_at: Timestamp::now(),
                metadata: metadata.clone(),
                payload,
            };

            Self::insert_event(&mut tx, &event, aggregate_id).await?;

            let entry = OutboxEntry::from_event(&event)?;
            Self::insert_outbox_entry(&mut tx, &entry).await?;

            stored.push(event);
        }

        tx.commit().await.map_err(backend)?;
        Ok(stored)
    }

    async fn load(&self, aggregate_id: ChatId) -> Result<Vec<DomainEvent>, EventStoreError> {
        let rows: Vec<(Uuid, String, String, i64, JsonValue, JsonValue, DateTime<Utc>)> =
            sqlx::query_as(
                r#"
                SELECT id, aggregate_type, event_type, version, data, metadata, occurred_at
                FROM chat_events
                WHERE aggregate_id = $1
                ORDER BY version ASC
                "#,
            )
            .bind(aggregate_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        if rows.is_empty() {
            return Err(EventStoreError::AggregateNotFound(aggregate_id));
        }

        let mut events = Vec::with_capacity(rows.len());
        for (id, aggregate_type, event_type, version, data, metadata, occurred_at) in rows {
            let payload = EventPayload::decode(&event_type, &data)?;
            let metadata: EventMetadata = serde_json::from_value(metadata)?;
            events.push(DomainEvent {
                event_id: EventId::from_uuid(id),
                aggregate_id: aggregate_id.to_string(),
                aggregate_type,
                version,
                occurred_at: Timestamp::from_datetime(occurred_at),
                metadata,
                payload,
            });
        }

        Ok(events)
    }

    async fn current_version(&self, aggregate_id: ChatId) -> Result<i64, EventStoreError> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM chat_events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
        Ok(version.unwrap_or(0))
    }
}
