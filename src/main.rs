//! Threadwork service entrypoint.
//!
//! Wires configuration, PostgreSQL, the Redis event bus, the internal
//! event consumers, and the outbox worker, then runs until interrupted.
//! The chat transports (HTTP/WebSocket) live in a separate service and
//! talk to this core through the application layer.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use threadwork::adapters::{
    EventSourcedChatRepository, HandlerDispatcher, IdempotentHandler, OutboxWorker,
    PostgresAuditLog, PostgresChatReadModel, PostgresEventStore, PostgresOutbox,
    PostgresProcessedEventStore, PostgresTaskBoard, PostgresUserDirectory, RedisEventBus,
};
use threadwork::application::handlers::{
    AuditLogHandler, ChatProjectionHandler, NotificationHandler, TaskProjectionHandler,
};
use threadwork::application::{CommandExecutor, TagPipeline};
use threadwork::config::AppConfig;
use threadwork::domain::foundation::DomainError;
use threadwork::ports::{
    ChatRepository, EventHandler, EventPublisher, EventSubscriber, Notification,
    NotificationSender, ProcessedEventStore,
};

/// Stand-in notification sender until the delivery service is attached:
/// notifications are logged, not delivered.
struct LogNotificationSender;

#[async_trait::async_trait]
impl NotificationSender for LogNotificationSender {
    async fn notify(&self, notification: Notification) -> Result<(), DomainError> {
        info!(
            recipient = %notification.recipient,
            title = %notification.title,
            "Notification queued"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    // Persistence
    let pool = PgPoolOptions::new()
        .max_connections(config.database.pool_size)
        .connect(&config.database.url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready");

    let event_store = Arc::new(PostgresEventStore::new(pool.clone()));
    let outbox = Arc::new(PostgresOutbox::new(pool.clone()));
    let processed_events: Arc<dyn ProcessedEventStore> =
        Arc::new(PostgresProcessedEventStore::new(pool.clone()));
    let repository: Arc<dyn ChatRepository> =
        Arc::new(EventSourcedChatRepository::new(event_store));
    let directory = Arc::new(PostgresUserDirectory::new(pool.clone()));
    let chat_read_model = Arc::new(PostgresChatReadModel::new(pool.clone()));
    let task_board = Arc::new(PostgresTaskBoard::new(pool.clone()));
    let audit_log = Arc::new(PostgresAuditLog::new(pool.clone()));

    // Event bus
    let dispatcher = Arc::new(HandlerDispatcher::new(
        config.events.bus.to_retry_policy(),
        config.events.bus.dead_letter_capacity,
    ));
    let redis_client = redis::Client::open(config.redis.url.as_str())?;
    let bus = Arc::new(
        tokio::time::timeout(
            config.redis.timeout(),
            RedisEventBus::connect(
                redis_client,
                config.events.bus.channel_prefix.clone(),
                dispatcher,
            ),
        )
        .await??,
    );

    // Consumers, each wrapped for idempotent at-least-once consumption.
    subscribe(
        bus.as_ref(),
        NotificationHandler::event_types(),
        IdempotentHandler::new(
            NotificationHandler::new(Arc::new(LogNotificationSender), chat_read_model.clone()),
            processed_events.clone(),
        ),
    )?;
    subscribe(
        bus.as_ref(),
        TaskProjectionHandler::event_types(),
        IdempotentHandler::new(
            TaskProjectionHandler::new(
                task_board,
                Arc::clone(&repository),
                Arc::clone(&bus) as Arc<dyn EventPublisher>,
            ),
            processed_events.clone(),
        ),
    )?;
    subscribe(
        bus.as_ref(),
        ChatProjectionHandler::event_types(),
        IdempotentHandler::new(
            ChatProjectionHandler::new(chat_read_model, Arc::clone(&repository)),
            processed_events.clone(),
        ),
    )?;
    subscribe(
        bus.as_ref(),
        AuditLogHandler::event_types(),
        IdempotentHandler::new(AuditLogHandler::new(audit_log), processed_events),
    )?;

    // Application services. The transport service drives these;
    // constructing them here makes a wiring regression fail at startup
    // instead of at first use.
    let executor = Arc::new(CommandExecutor::new(Arc::clone(&repository), directory));
    let _tag_pipeline = TagPipeline::new(Arc::clone(&repository), executor);

    // Background loops
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let bus_handle = {
        let bus = Arc::clone(&bus);
        tokio::spawn(async move {
            if let Err(err) = bus.run().await {
                error!(error = %err, "Event bus stopped with error");
            }
        })
    };

    let worker = OutboxWorker::with_config(
        outbox,
        Arc::clone(&bus) as Arc<dyn EventPublisher>,
        config.events.worker.to_worker_config(),
    );
    let worker_handle = {
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(err) = worker.run(shutdown_rx).await {
                error!(error = %err, "Outbox worker stopped with error");
            }
        })
    };

    info!("Threadwork core running; press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    bus.shutdown().await;
    let _ = worker_handle.await;
    let _ = bus_handle.await;

    Ok(())
}

fn subscribe<H: EventHandler + 'static>(
    bus: &RedisEventBus,
    event_types: &[&str],
    handler: IdempotentHandler<H>,
) -> Result<(), threadwork::ports::BusError> {
    let handler: Arc<dyn EventHandler> = Arc::new(handler);
    for event_type in event_types {
        bus.subscribe(event_type, Arc::clone(&handler))?;
    }
    Ok(())
}
