//! Handler dispatch with per-handler retry and dead-lettering.
//!
//! The bus receive loop hands every incoming envelope to a dispatcher.
//! Each registered handler runs on its own tokio task, so one slow or
//! failing handler never delays the others. Failures are retried with
//! exponential backoff; when retries are exhausted the event goes to a
//! bounded dead-letter sink and delivery for that handler stops.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::domain::foundation::{EventEnvelope, Timestamp};
use crate::ports::{BusError, EventHandler};

/// Exponential backoff policy for handler retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = max_retries + 1.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Backoff to sleep after the given zero-based attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(attempt as i32);
        let backoff = self.initial_backoff.mul_f64(factor.max(0.0));
        backoff.min(self.max_backoff)
    }
}

/// An event whose handler retries were exhausted.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub event: EventEnvelope,
    pub handler: &'static str,
    pub error: String,
    pub failed_at: Timestamp,
}

/// Bounded retention of dead-lettered events, oldest dropped first.
#[derive(Debug)]
pub struct DeadLetterSink {
    entries: Mutex<VecDeque<DeadLetter>>,
    capacity: usize,
}

impl DeadLetterSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Appends a dead letter, trimming to capacity.
    pub fn push(&self, letter: DeadLetter) {
        let mut entries = self.entries.lock().expect("dead-letter lock poisoned");
        entries.push_back(letter);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Snapshot of the retained dead letters, oldest first.
    pub fn entries(&self) -> Vec<DeadLetter> {
        self.entries
            .lock()
            .expect("dead-letter lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("dead-letter lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Subscriber table plus the task machinery that invokes handlers.
pub struct HandlerDispatcher {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
    retry: RetryPolicy,
    dead_letters: Arc<DeadLetterSink>,
    tasks: tokio::sync::Mutex<JoinSet<()>>,
    shutdown: watch::Sender<bool>,
}

impl HandlerDispatcher {
    pub fn new(retry: RetryPolicy, dead_letter_capacity: usize) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            handlers: RwLock::new(HashMap::new()),
            retry,
            dead_letters: Arc::new(DeadLetterSink::new(dead_letter_capacity)),
            tasks: tokio::sync::Mutex::new(JoinSet::new()),
            shutdown,
        }
    }

    /// Registers a handler for an event type.
    pub fn subscribe(
        &self,
        event_type: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), BusError> {
        if event_type.is_empty() {
            return Err(BusError::EmptyEventType);
        }

        let mut handlers = self.handlers.write().expect("handler table lock poisoned");
        handlers
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
        Ok(())
    }

    /// Dispatches one envelope: every matching handler gets its own task.
    ///
    /// The handler list is copied out under the read lock before any
    /// invocation, so subscribes never contend with running handlers.
    pub async fn dispatch(&self, envelope: EventEnvelope) {
        let matching: Vec<Arc<dyn EventHandler>> = {
            let handlers = self.handlers.read().expect("handler table lock poisoned");
            handlers
                .get(&envelope.event_type)
                .cloned()
                .unwrap_or_default()
        };

        if matching.is_empty() {
            return;
        }

        let mut tasks = self.tasks.lock().await;
        // Reap finished invocations so the set does not grow unbounded.
        while tasks.try_join_next().is_some() {}

        for handler in matching {
            let envelope = envelope.clone();
            let retry = self.retry.clone();
            let shutdown = self.shutdown.subscribe();
            let dead_letters = Arc::clone(&self.dead_letters);
            tasks.spawn(async move {
                invoke_with_retry(handler, envelope, retry, shutdown, dead_letters).await;
            });
        }
    }

    /// Signals shutdown and waits for all in-flight handler tasks.
    ///
    /// Idempotent; sleeping retries abort at their next wakeup.
    pub async fn drain(&self) {
        let _ = self.shutdown.send(true);
        let mut tasks = self.tasks.lock().await;
        while tasks.join_next().await.is_some() {}
    }

    /// The dead-letter sink shared with handler tasks.
    pub fn dead_letters(&self) -> &DeadLetterSink {
        &self.dead_letters
    }

    /// Number of registered (event type, handler) pairs.
    pub fn subscription_count(&self) -> usize {
        self.handlers
            .read()
            .expect("handler table lock poisoned")
            .values()
            .map(Vec::len)
            .sum()
    }
}

/// Runs one handler invocation through the retry policy.
async fn invoke_with_retry(
    handler: Arc<dyn EventHandler>,
    envelope: EventEnvelope,
    policy: RetryPolicy,
    mut shutdown: watch::Receiver<bool>,
    dead_letters: Arc<DeadLetterSink>,
) {
    let handler_name = handler.name();
    let mut attempt: u32 = 0;

    loop {
        match handler.handle(envelope.clone()).await {
            Ok(()) => {
                if attempt > 0 {
                    info!(
                        handler = handler_name,
                        event_id = %envelope.event_id,
                        attempt,
                        "Handler recovered after retry"
                    );
                }
                return;
            }
            Err(err) => {
                if attempt >= policy.max_retries {
                    error!(
                        handler = handler_name,
                        event_id = %envelope.event_id,
                        event_type = %envelope.event_type,
                        attempts = attempt + 1,
                        error = %err,
                        "Handler retries exhausted; dead-lettering event"
                    );
                    dead_letters.push(DeadLetter {
                        event: envelope,
                        handler: handler_name,
                        error: err.to_string(),
                        failed_at: Timestamp::now(),
                    });
                    return;
                }

                let backoff = policy.backoff_for(attempt);
                warn!(
                    handler = handler_name,
                    event_id = %envelope.event_id,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Handler failed; retrying after backoff"
                );

                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            warn!(
                                handler = handler_name,
                                event_id = %envelope.event_id,
                                "Retry aborted by shutdown"
                            );
                            return;
                        }
                    }
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::domain::foundation::{DomainError, ErrorCode};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(40),
            backoff_factor: 2.0,
        }
    }

    struct CountingHandler {
        name: &'static str,
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl CountingHandler {
        fn succeeding(name: &'static str) -> Arc<Self> {
            Arc::new(Self { name, calls: AtomicUsize::new(0), fail_first: 0 })
        }

        fn failing_first(name: &'static str, failures: usize) -> Arc<Self> {
            Arc::new(Self { name, calls: AtomicUsize::new(0), fail_first: failures })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _: EventEnvelope) -> Result<(), DomainError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(DomainError::new(ErrorCode::InternalError, "transient failure"))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(35),
            backoff_factor: 2.0,
        };

        assert_eq!(policy.backoff_for(0), Duration::from_millis(10));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(20));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(35));
        assert_eq!(policy.backoff_for(10), Duration::from_millis(35));
    }

    #[test]
    fn subscribe_rejects_empty_event_type() {
        let dispatcher = HandlerDispatcher::new(RetryPolicy::default(), 10);
        let result = dispatcher.subscribe("", CountingHandler::succeeding("H"));
        assert!(matches!(result, Err(BusError::EmptyEventType)));
    }

    #[tokio::test]
    async fn handler_receives_dispatched_event() {
        let dispatcher = HandlerDispatcher::new(fast_policy(0), 10);
        let handler = CountingHandler::succeeding("H");
        dispatcher.subscribe("chat.created", handler.clone()).unwrap();

        dispatcher
            .dispatch(EventEnvelope::test_fixture("chat.created", "chat-1"))
            .await;
        dispatcher.drain().await;

        assert_eq!(handler.calls(), 1);
    }

    #[tokio::test]
    async fn unmatched_event_types_are_ignored() {
        let dispatcher = HandlerDispatcher::new(fast_policy(0), 10);
        let handler = CountingHandler::succeeding("H");
        dispatcher.subscribe("chat.created", handler.clone()).unwrap();

        dispatcher
            .dispatch(EventEnvelope::test_fixture("chat.renamed", "chat-1"))
            .await;
        dispatcher.drain().await;

        assert_eq!(handler.calls(), 0);
    }

    #[tokio::test]
    async fn failing_handler_is_retried_until_success() {
        // Fails twice, succeeds on the third attempt: max_retries=2 means
        // exactly three attempts and no dead letter.
        let dispatcher = HandlerDispatcher::new(fast_policy(2), 10);
        let handler = CountingHandler::failing_first("Flaky", 2);
        dispatcher.subscribe("task.created", handler.clone()).unwrap();

        dispatcher
            .dispatch(EventEnvelope::test_fixture("task.created", "chat-2"))
            .await;
        dispatcher.drain().await;

        assert_eq!(handler.calls(), 3);
        assert!(dispatcher.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_dead_letter_the_event() {
        let dispatcher = HandlerDispatcher::new(fast_policy(2), 10);
        let handler = CountingHandler::failing_first("Broken", usize::MAX);
        dispatcher.subscribe("task.created", handler.clone()).unwrap();

        dispatcher
            .dispatch(EventEnvelope::test_fixture("task.created", "chat-3"))
            .await;
        dispatcher.drain().await;

        // max_retries + 1 total attempts
        assert_eq!(handler.calls(), 3);
        let letters = dispatcher.dead_letters().entries();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].handler, "Broken");
        assert_eq!(letters[0].event.event_type, "task.created");
    }

    #[tokio::test]
    async fn one_handlers_failure_never_affects_another() {
        let dispatcher = HandlerDispatcher::new(fast_policy(1), 10);
        let healthy = CountingHandler::succeeding("Healthy");
        let broken = CountingHandler::failing_first("Broken", usize::MAX);
        dispatcher.subscribe("chat.status_changed", healthy.clone()).unwrap();
        dispatcher.subscribe("chat.status_changed", broken.clone()).unwrap();

        dispatcher
            .dispatch(EventEnvelope::test_fixture("chat.status_changed", "chat-4"))
            .await;
        dispatcher.drain().await;

        assert_eq!(healthy.calls(), 1);
        assert_eq!(broken.calls(), 2);
        assert_eq!(dispatcher.dead_letters().len(), 1);
    }

    #[tokio::test]
    async fn multiple_handlers_each_receive_the_event() {
        let dispatcher = HandlerDispatcher::new(fast_policy(0), 10);
        let first = CountingHandler::succeeding("First");
        let second = CountingHandler::succeeding("Second");
        let third = CountingHandler::succeeding("Third");
        for handler in [first.clone(), second.clone(), third.clone()] {
            dispatcher.subscribe("chat.created", handler).unwrap();
        }

        dispatcher
            .dispatch(EventEnvelope::test_fixture("chat.created", "chat-5"))
            .await;
        dispatcher.drain().await;

        assert_eq!(first.calls() + second.calls() + third.calls(), 3);
    }

    #[tokio::test]
    async fn dead_letter_sink_trims_to_capacity() {
        let sink = DeadLetterSink::new(2);
        for i in 0..5 {
            sink.push(DeadLetter {
                event: EventEnvelope::test_fixture("chat.created", &format!("chat-{}", i)),
                handler: "H",
                error: "boom".to_string(),
                failed_at: Timestamp::now(),
            });
        }

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        // Oldest were dropped.
        assert_eq!(entries[0].event.aggregate_id, "chat-3");
        assert_eq!(entries[1].event.aggregate_id, "chat-4");
    }

    #[tokio::test]
    async fn drain_is_idempotent() {
        let dispatcher = HandlerDispatcher::new(fast_policy(0), 10);
        dispatcher.drain().await;
        dispatcher.drain().await;
    }
}
