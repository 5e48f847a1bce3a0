//! Redis-backed event bus for production deployments.
//!
//! Publishing serializes the envelope as JSON onto the pub/sub channel
//! `<prefix><event_type>`. The receive loop pattern-subscribes to
//! `<prefix>*` and hands every incoming envelope to the dispatcher,
//! which runs each handler on its own task with retry. The prefix
//! isolates logically separate bus instances sharing one broker.
//!
//! Retry and backoff live in the dispatcher, not in Redis: the broker
//! only carries frames.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::domain::foundation::EventEnvelope;
use crate::ports::{BusError, EventHandler, EventPublisher, EventSubscriber};

use super::dispatcher::HandlerDispatcher;

/// Channel name for an event type under a prefix.
fn channel_name(prefix: &str, event_type: &str) -> String {
    format!("{}{}", prefix, event_type)
}

fn connection_error(err: redis::RedisError) -> BusError {
    BusError::Connection(err.to_string())
}

/// Redis pub/sub event bus.
pub struct RedisEventBus {
    client: redis::Client,
    conn: MultiplexedConnection,
    dispatcher: Arc<HandlerDispatcher>,
    channel_prefix: String,
    started: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl RedisEventBus {
    /// Connects the publishing half of the bus.
    ///
    /// The receive loop opens its own dedicated connection in [`run`],
    /// because a subscribed Redis connection cannot issue commands.
    pub async fn connect(
        client: redis::Client,
        channel_prefix: impl Into<String>,
        dispatcher: Arc<HandlerDispatcher>,
    ) -> Result<Self, BusError> {
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(connection_error)?;
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            client,
            conn,
            dispatcher,
            channel_prefix: channel_prefix.into(),
            started: AtomicBool::new(false),
            shutdown,
        })
    }

    /// Runs the receive loop until shutdown.
    ///
    /// Subscribes to `<prefix>*`; the method has received the
    /// subscription acknowledgement once the `psubscribe` call returns.
    /// Starting a second time is an error. On shutdown the loop stops,
    /// in-flight handler tasks are drained, and the subscription closes
    /// with the connection.
    pub async fn run(&self) -> Result<(), BusError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(BusError::AlreadyStarted);
        }

        let conn = self
            .client
            .get_async_connection()
            .await
            .map_err(connection_error)?;
        let mut pubsub = conn.into_pubsub();
        let pattern = format!("{}*", self.channel_prefix);
        pubsub.psubscribe(&pattern).await.map_err(connection_error)?;
        info!(pattern = %pattern, "Event bus subscribed");

        let mut shutdown = self.shutdown.subscribe();
        {
            let mut messages = pubsub.on_message();
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Event bus receive loop stopping");
                            break;
                        }
                    }
                    message = messages.next() => {
                        match message {
                            Some(msg) => self.handle_message(msg).await,
                            None => {
                                warn!("Event bus subscription stream closed by broker");
                                break;
                            }
                        }
                    }
                }
            }
        }

        self.dispatcher.drain().await;
        Ok(())
    }

    async fn handle_message(&self, msg: redis::Msg) {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(err) => {
                error!(error = %err, "Failed to read bus message payload");
                return;
            }
        };

        match serde_json::from_str::<EventEnvelope>(&payload) {
            Ok(envelope) => self.dispatcher.dispatch(envelope).await,
            Err(err) => {
                // Corrupted envelope: fatal for this message, never for
                // the loop.
                error!(
                    channel = msg.get_channel_name(),
                    error = %err,
                    "Dropping undecodable bus message"
                );
            }
        }
    }

    /// Signals the receive loop to stop and waits for in-flight handler
    /// tasks. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        self.dispatcher.drain().await;
    }

    /// The dispatcher backing this bus.
    pub fn dispatcher(&self) -> &HandlerDispatcher {
        &self.dispatcher
    }
}

#[async_trait]
impl EventPublisher for RedisEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), BusError> {
        let channel = channel_name(&self.channel_prefix, &event.event_type);
        let payload = serde_json::to_string(&event)?;

        let mut conn = self.conn.clone();
        let _receivers: i64 = conn
            .publish(&channel, payload)
            .await
            .map_err(connection_error)?;
        Ok(())
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), BusError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

impl EventSubscriber for RedisEventBus {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) -> Result<(), BusError> {
        self.dispatcher.subscribe(event_type, handler)
    }
}
