//! Event infrastructure adapters: dispatch, buses, worker, idempotency.

mod dispatcher;
mod idempotent_handler;
mod in_memory;
mod outbox_worker;
mod redis_bus;

pub use dispatcher::{DeadLetter, DeadLetterSink, HandlerDispatcher, RetryPolicy};
pub use idempotent_handler::IdempotentHandler;
pub use in_memory::InMemoryEventBus;
pub use outbox_worker::{OutboxWorker, OutboxWorkerConfig, WorkerMetrics};
pub use redis_bus::RedisEventBus;
