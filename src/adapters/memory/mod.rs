//! In-memory event store and outbox for testing.
//!
//! The pair shares one state lock, so an append and its outbox co-write
//! are atomic exactly like the Postgres adapters' shared transaction.
//! Locks are panicked on poison; this pair is for tests only.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::domain::events::{DomainEvent, EventPayload};
use crate::domain::foundation::{ChatId, EventId, EventMetadata, Timestamp};
use crate::ports::{EventStore, EventStoreError, Outbox, OutboxEntry, OutboxError, OutboxStats};

#[derive(Default)]
struct State {
    logs: HashMap<ChatId, Vec<DomainEvent>>,
    outbox: Vec<OutboxEntry>,
}

/// Creates a store/outbox pair over shared state.
pub fn in_memory_store() -> (Arc<InMemoryEventStore>, Arc<InMemoryOutbox>) {
    let state = Arc::new(Mutex::new(State::default()));
    (
        Arc::new(InMemoryEventStore { state: Arc::clone(&state) }),
        Arc::new(InMemoryOutbox { state }),
    )
}

/// In-memory append-only event log.
pub struct InMemoryEventStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryEventStore {
    /// Number of events across all aggregates.
    pub fn total_events(&self) -> usize {
        self.state
            .lock()
            .expect("store lock poisoned")
            .logs
            .values()
            .map(Vec::len)
            .sum()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
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

        let mut state = self.state.lock().expect("store lock poisoned");
        let log = state.logs.entry(aggregate_id).or_default();
        let current = log.last().map(|e| e.version).unwrap_or(0);
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
            stored.push(event);
        }

        // Same "transaction": log rows and outbox entries land together
        // under the one lock, or the whole call fails.
        let mut entries = Vec::with_capacity(stored.len());
        for event in &stored {
            entries.push(OutboxEntry::from_event(event)?);
        }

        state
            .logs
            .get_mut(&aggregate_id)
            .expect("log entry just created")
            .extend(stored.iter().cloned());
        state.outbox.extend(entries);

        Ok(stored)
    }

    async fn load(&self, aggregate_id: ChatId) -> Result<Vec<DomainEvent>, EventStoreError> {
        let state = self.state.lock().expect("store lock poisoned");
        match state.logs.get(&aggregate_id) {
            Some(log) if !log.is_empty() => Ok(log.clone()),
            _ => Err(EventStoreError::AggregateNotFound(aggregate_id)),
        }
    }

    async fn current_version(&self, aggregate_id: ChatId) -> Result<i64, EventStoreError> {
        let state = self.state.lock().expect("store lock poisoned");
        Ok(state
            .logs
            .get(&aggregate_id)
            .and_then(|log| log.last())
            .map(|e| e.version)
            .unwrap_or(0))
    }
}

/// In-memory outbox over the same state as the store.
pub struct InMemoryOutbox {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl Outbox for InMemoryOutbox {
    async fn add(&self, event: &DomainEvent) -> Result<(), OutboxError> {
        let entry = OutboxEntry::from_event(event)?;
        self.state
            .lock()
            .expect("outbox lock poisoned")
            .outbox
            .push(entry);
        Ok(())
    }

    async fn add_batch(&self, events: &[DomainEvent]) -> Result<(), OutboxError> {
        let mut entries = Vec::with_capacity(events.len());
        for event in events {
            entries.push(OutboxEntry::from_event(event)?);
        }
        self.state
            .lock()
            .expect("outbox lock poisoned")
            .outbox
            .extend(entries);
        Ok(())
    }

    async fn poll(&self, batch_size: u32) -> Result<Vec<OutboxEntry>, OutboxError> {
        let state = self.state.lock().expect("outbox lock poisoned");
        let mut pending: Vec<OutboxEntry> = state
            .outbox
            .iter()
            .filter(|e| e.is_pending())
            .cloned()
            .collect();
        // Insertion order already matches created_at order; the sort is
        // kept stable so same-timestamp batches stay in insert order.
        pending.sort_by_key(|e| e.created_at);
        pending.truncate(batch_size as usize);
        Ok(pending)
    }

    async fn mark_processed(&self, entry_id: Uuid) -> Result<(), OutboxError> {
        let mut state = self.state.lock().expect("outbox lock poisoned");
        let entry = state
            .outbox
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or(OutboxError::EntryNotFound(entry_id))?;
        entry.mark_processed();
        Ok(())
    }

    async fn mark_failed(&self, entry_id: Uuid, error: &str) -> Result<(), OutboxError> {
        let mut state = self.state.lock().expect("outbox lock poisoned");
        let entry = state
            .outbox
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or(OutboxError::EntryNotFound(entry_id))?;
        entry.mark_failed(error);
        Ok(())
    }

    async fn cleanup(&self, older_than: std::time::Duration) -> Result<u64, OutboxError> {
        let cutoff = Timestamp::now().minus_duration(older_than);
        let mut state = self.state.lock().expect("outbox lock poisoned");
        let before = state.outbox.len();
        state.outbox.retain(|e| match e.processed_at {
            Some(processed_at) => processed_at.is_after(&cutoff),
            None => true,
        });
        Ok((before - state.outbox.len()) as u64)
    }

    async fn count(&self) -> Result<u64, OutboxError> {
        let state = self.state.lock().expect("outbox lock poisoned");
        Ok(state.outbox.iter().filter(|e| e.is_pending()).count() as u64)
    }

    async fn stats(&self) -> Result<OutboxStats, OutboxError> {
        let state = self.state.lock().expect("outbox lock poisoned");
        let pending: Vec<&OutboxEntry> =
            state.outbox.iter().filter(|e| e.is_pending()).collect();
        Ok(OutboxStats {
            pending: pending.len() as u64,
            oldest_pending_at: pending.iter().map(|e| e.created_at).min(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::{ChatCreated, ChatEvent, StatusChanged, TypeChanged};
    use crate::domain::chat::ChatKind;
    use crate::domain::foundation::{UserId, WorkspaceId};

    fn created() -> EventPayload {
        EventPayload::Chat(ChatEvent::Created(ChatCreated {
            workspace_id: WorkspaceId::new(),
            title: "Planning".to_string(),
            created_by: UserId::new(),
        }))
    }

    fn converted() -> EventPayload {
        EventPayload::Chat(ChatEvent::TypeChanged(TypeChanged {
            new_type: ChatKind::Task,
            title: "Implement OAuth".to_string(),
        }))
    }

    fn status(new_status: &str) -> EventPayload {
        EventPayload::Chat(ChatEvent::StatusChanged(StatusChanged {
            old_status: None,
            new_status: new_status.to_string(),
        }))
    }

    #[tokio::test]
    async fn append_assigns_sequential_versions() {
        let (store, _) = in_memory_store();
        let chat_id = ChatId::new();

        let stored = store
            .append(chat_id, vec![created(), converted()], 0, EventMetadata::default())
            .await
            .unwrap();

        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].version, 1);
        assert_eq!(stored[1].version, 2);
        assert_eq!(store.current_version(chat_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn append_with_stale_version_conflicts_without_partial_write() {
        let (store, outbox) = in_memory_store();
        let chat_id = ChatId::new();
        store
            .append(chat_id, vec![created()], 0, EventMetadata::default())
            .await
            .unwrap();

        let result = store
            .append(chat_id, vec![converted(), status("To Do")], 0, EventMetadata::default())
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { expected: 0, actual: 1, .. })
        ));
        assert_eq!(store.current_version(chat_id).await.unwrap(), 1);
        assert_eq!(outbox.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_batch_is_a_noop() {
        let (store, outbox) = in_memory_store();
        let chat_id = ChatId::new();

        let stored = store
            .append(chat_id, vec![], 0, EventMetadata::default())
            .await
            .unwrap();

        assert!(stored.is_empty());
        assert_eq!(store.current_version(chat_id).await.unwrap(), 0);
        assert_eq!(outbox.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn load_returns_events_in_version_order() {
        let (store, _) = in_memory_store();
        let chat_id = ChatId::new();
        store
            .append(chat_id, vec![created()], 0, EventMetadata::default())
            .await
            .unwrap();
        store
            .append(chat_id, vec![converted()], 1, EventMetadata::default())
            .await
            .unwrap();

        let events = store.load(chat_id).await.unwrap();
        let versions: Vec<i64> = events.iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[tokio::test]
    async fn load_unknown_aggregate_fails() {
        let (store, _) = in_memory_store();
        let result = store.load(ChatId::new()).await;
        assert!(matches!(result, Err(EventStoreError::AggregateNotFound(_))));
    }

    #[tokio::test]
    async fn every_appended_event_has_exactly_one_outbox_entry() {
        let (store, outbox) = in_memory_store();
        let chat_id = ChatId::new();

        let stored = store
            .append(chat_id, vec![created(), converted()], 0, EventMetadata::default())
            .await
            .unwrap();

        let entries = outbox.poll(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        for (event, entry) in stored.iter().zip(&entries) {
            assert_eq!(entry.event_id, event.event_id);
            assert_eq!(entry.event_type, event.event_type());
        }
    }

    #[tokio::test]
    async fn poll_on_empty_outbox_returns_empty() {
        let (_, outbox) = in_memory_store();
        assert!(outbox.poll(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn poll_preserves_per_aggregate_version_order() {
        let (store, outbox) = in_memory_store();
        let chat_id = ChatId::new();
        store
            .append(
                chat_id,
                vec![created(), converted(), status("In Progress")],
                0,
                EventMetadata::default(),
            )
            .await
            .unwrap();

        let entries = outbox.poll(10).await.unwrap();
        let types: Vec<&str> = entries.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            types,
            vec!["chat.created", "chat.type_changed", "chat.status_changed"]
        );
    }

    #[tokio::test]
    async fn mark_processed_removes_from_pending() {
        let (store, outbox) = in_memory_store();
        let chat_id = ChatId::new();
        store
            .append(chat_id, vec![created()], 0, EventMetadata::default())
            .await
            .unwrap();

        let entry = outbox.poll(1).await.unwrap().remove(0);
        outbox.mark_processed(entry.id).await.unwrap();

        assert_eq!(outbox.count().await.unwrap(), 0);
        assert!(outbox.poll(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_failed_increments_retry_count() {
        let (store, outbox) = in_memory_store();
        let chat_id = ChatId::new();
        store
            .append(chat_id, vec![created()], 0, EventMetadata::default())
            .await
            .unwrap();

        let entry = outbox.poll(1).await.unwrap().remove(0);
        outbox.mark_failed(entry.id, "broker down").await.unwrap();

        let entry = outbox.poll(1).await.unwrap().remove(0);
        assert_eq!(entry.retry_count, 1);
        assert_eq!(entry.last_error.as_deref(), Some("broker down"));
    }

    #[tokio::test]
    async fn mark_on_unknown_entry_fails() {
        let (_, outbox) = in_memory_store();
        let result = outbox.mark_processed(Uuid::new_v4()).await;
        assert!(matches!(result, Err(OutboxError::EntryNotFound(_))));
    }

    #[tokio::test]
    async fn stats_reports_pending_and_oldest() {
        let (store, outbox) = in_memory_store();
        let chat_id = ChatId::new();
        store
            .append(chat_id, vec![created(), converted()], 0, EventMetadata::default())
            .await
            .unwrap();

        let stats = outbox.stats().await.unwrap();
        assert_eq!(stats.pending, 2);
        assert!(stats.oldest_pending_at.is_some());
    }

    #[tokio::test]
    async fn cleanup_removes_only_old_processed_entries() {
        let (store, outbox) = in_memory_store();
        let chat_id = ChatId::new();
        store
            .append(chat_id, vec![created(), converted()], 0, EventMetadata::default())
            .await
            .unwrap();

        let entries = outbox.poll(10).await.unwrap();
        outbox.mark_processed(entries[0].id).await.unwrap();

        // Zero age: every processed entry is old enough to delete.
        let deleted = outbox.cleanup(std::time::Duration::ZERO).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(outbox.count().await.unwrap(), 1);
    }
}
