//! Ports - interfaces between the domain and the outside world.
//!
//! Following hexagonal architecture, ports define the contracts the
//! adapters implement:
//!
//! - `EventStore` / `ChatRepository` - the event-sourced write side
//! - `Outbox` - durable staging between store and bus
//! - `EventPublisher` / `EventSubscriber` / `EventHandler` - the bus
//! - `ProcessedEventStore` - consumer-side idempotency tracking
//! - `UserDirectory` - username resolution (read-only)
//! - read models - chat listing, task board, audit trail, notifications

mod chat_repository;
mod event_publisher;
mod event_store;
mod event_subscriber;
mod outbox;
mod processed_event_store;
mod read_models;
mod user_directory;

pub use chat_repository::ChatRepository;
pub use event_publisher::{BusError, EventPublisher};
pub use event_store::{EventStore, EventStoreError};
pub use event_subscriber::{EventBus, EventHandler, EventSubscriber};
pub use outbox::{Outbox, OutboxEntry, OutboxError, OutboxStats};
pub use processed_event_store::ProcessedEventStore;
pub use read_models::{
    AuditLog, AuditRecord, ChatReadModel, ChatRecord, Notification, NotificationSender, TaskBoard,
    TaskCard,
};
pub use user_directory::{UserDirectory, UserRecord};
