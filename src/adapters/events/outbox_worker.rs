//! Outbox worker - background relay from the outbox to the event bus.
//!
//! The second half of the transactional outbox pattern: command handlers
//! stage events in the outbox inside the event-store transaction, and
//! this worker polls pending entries and publishes them. A failed
//! publish leaves the entry pending with an incremented retry count; an
//! entry whose retries are exhausted is marked processed so it drains
//! instead of cycling forever. Duplicates are possible across worker
//! crashes - consumers are idempotent on the event id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{error, info, warn};

use crate::domain::events::EventPayload;
use crate::ports::{EventPublisher, Outbox, OutboxEntry, OutboxError};

/// Configuration for the outbox worker.
#[derive(Debug, Clone)]
pub struct OutboxWorkerConfig {
    /// How often to poll for pending entries.
    pub poll_interval: Duration,
    /// Maximum entries per poll cycle.
    pub batch_size: u32,
    /// Publish attempts before an entry is drained as poisoned.
    pub max_retries: u32,
    /// Processed entries older than this are deleted by cleanup.
    pub cleanup_age: Duration,
    /// How often the cleanup pass runs.
    pub cleanup_interval: Duration,
    /// A disabled worker exits cleanly on start.
    pub enabled: bool,
}

impl Default for OutboxWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            batch_size: 100,
            max_retries: 5,
            cleanup_age: Duration::from_secs(7 * 24 * 60 * 60),
            cleanup_interval: Duration::from_secs(60 * 60),
            enabled: true,
        }
    }
}

impl OutboxWorkerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// Counters and gauges the worker maintains.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    published: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    cleaned: AtomicU64,
    pending: AtomicU64,
}

impl WorkerMetrics {
    /// Events published successfully.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Publish attempts that failed and left the entry pending.
    pub fn retried(&self) -> u64 {
        self.retried.load(Ordering::Relaxed)
    }

    /// Entries drained with retries exhausted.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Processed entries deleted by cleanup.
    pub fn cleaned(&self) -> u64 {
        self.cleaned.load(Ordering::Relaxed)
    }

    /// Pending entries at the last poll.
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }
}

/// Background relay between the outbox and the bus.
pub struct OutboxWorker {
    outbox: Arc<dyn Outbox>,
    publisher: Arc<dyn EventPublisher>,
    config: OutboxWorkerConfig,
    metrics: Arc<WorkerMetrics>,
}

impl OutboxWorker {
    pub fn new(outbox: Arc<dyn Outbox>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self::with_config(outbox, publisher, OutboxWorkerConfig::default())
    }

    pub fn with_config(
        outbox: Arc<dyn Outbox>,
        publisher: Arc<dyn EventPublisher>,
        config: OutboxWorkerConfig,
    ) -> Self {
        Self {
            outbox,
            publisher,
            config,
            metrics: Arc::new(WorkerMetrics::default()),
        }
    }

    /// The worker's metric counters.
    pub fn metrics(&self) -> Arc<WorkerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Runs poll and cleanup tickers until the shutdown signal fires.
    ///
    /// A disabled worker logs and returns immediately. On shutdown one
    /// final batch is processed so a graceful stop does not strand
    /// entries that were already due.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), OutboxError> {
        if !self.config.enabled {
            info!("Outbox worker disabled; exiting");
            return Ok(());
        }

        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            max_retries = self.config.max_retries,
            "Outbox worker started"
        );

        let mut poll = time::interval(self.config.poll_interval);
        let mut cleanup = time::interval(self.config.cleanup_interval);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.poll_cycle().await;
                        info!("Outbox worker stopped");
                        return Ok(());
                    }
                }
                _ = poll.tick() => {
                    self.poll_cycle().await;
                }
                _ = cleanup.tick() => {
                    self.cleanup_cycle().await;
                }
            }
        }
    }

    /// Runs one poll cycle: refresh gauges, fetch a batch, process each
    /// entry. Per-entry failures never halt the batch.
    pub async fn poll_cycle(&self) -> usize {
        match self.outbox.stats().await {
            Ok(stats) => self.metrics.pending.store(stats.pending, Ordering::Relaxed),
            Err(err) => warn!(error = %err, "Failed to read outbox stats"),
        }

        let entries = match self.outbox.poll(self.config.batch_size).await {
            Ok(entries) => entries,
            Err(err) => {
                error!(error = %err, "Outbox poll failed");
                return 0;
            }
        };

        let mut published = 0;
        for entry in entries {
            match self.process_entry(&entry).await {
                Ok(true) => published += 1,
                Ok(false) => {}
                Err(err) => {
                    error!(
                        entry_id = %entry.id,
                        event_id = %entry.event_id,
                        error = %err,
                        "Failed to process outbox entry"
                    );
                }
            }
        }
        published
    }

    /// Processes one entry. Returns whether the event was published.
    async fn process_entry(&self, entry: &OutboxEntry) -> Result<bool, OutboxError> {
        if entry.retry_count >= self.config.max_retries as i32 {
            error!(
                entry_id = %entry.id,
                event_id = %entry.event_id,
                event_type = %entry.event_type,
                retry_count = entry.retry_count,
                last_error = entry.last_error.as_deref().unwrap_or(""),
                "Outbox entry exhausted retries; draining without publish"
            );
            self.outbox.mark_processed(entry.id).await?;
            self.metrics.failed.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        }

        let envelope = match entry.envelope() {
            Ok(envelope) => envelope,
            Err(err) => {
                // Corrupted payload is fatal for the entry; record the
                // failure so the poison path eventually drains it.
                error!(
                    entry_id = %entry.id,
                    event_id = %entry.event_id,
                    error = %err,
                    "Outbox payload is unreadable"
                );
                self.outbox
                    .mark_failed(entry.id, &format!("unreadable payload: {}", err))
                    .await?;
                self.metrics.retried.fetch_add(1, Ordering::Relaxed);
                return Ok(false);
            }
        };

        if let Err(err) = EventPayload::decode(&entry.event_type, &envelope.payload) {
            error!(
                entry_id = %entry.id,
                event_type = %entry.event_type,
                error = %err,
                "Outbox entry failed registry validation"
            );
            self.outbox
                .mark_failed(entry.id, &err.to_string())
                .await?;
            self.metrics.retried.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        }

        match self.publisher.publish(envelope).await {
            Ok(()) => {
                self.outbox.mark_processed(entry.id).await?;
                self.metrics.published.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            Err(err) => {
                warn!(
                    entry_id = %entry.id,
                    event_id = %entry.event_id,
                    retry_count = entry.retry_count,
                    error = %err,
                    "Publish failed; entry stays pending"
                );
                self.outbox.mark_failed(entry.id, &err.to_string()).await?;
                self.metrics.retried.fetch_add(1, Ordering::Relaxed);
                Ok(false)
            }
        }
    }

    /// Deletes processed entries older than the configured age.
    pub async fn cleanup_cycle(&self) {
        match self.outbox.cleanup(self.config.cleanup_age).await {
            Ok(deleted) => {
                if deleted > 0 {
                    info!(deleted, "Outbox cleanup removed processed entries");
                }
                self.metrics.cleaned.fetch_add(deleted, Ordering::Relaxed);
            }
            Err(err) => error!(error = %err, "Outbox cleanup failed"),
        }
    }
}
