//! Adapters - implementations of the port interfaces.
//!
//! - `events` - bus infrastructure (dispatcher, Redis, in-memory, worker)
//! - `memory` - in-memory store/outbox pair for tests
//! - `postgres` - PostgreSQL persistence
//! - `repository` - the event-sourced chat repository

pub mod events;
pub mod memory;
pub mod postgres;
mod repository;

pub use events::{
    DeadLetter, DeadLetterSink, HandlerDispatcher, IdempotentHandler, InMemoryEventBus,
    OutboxWorker, OutboxWorkerConfig, RedisEventBus, RetryPolicy, WorkerMetrics,
};
pub use memory::{in_memory_store, InMemoryEventStore, InMemoryOutbox};
pub use postgres::{
    PostgresAuditLog, PostgresChatReadModel, PostgresEventStore, PostgresOutbox,
    PostgresProcessedEventStore, PostgresTaskBoard, PostgresUserDirectory,
};
pub use repository::EventSourcedChatRepository;
