//! Event pipeline configuration: outbox worker and bus settings.

use serde::Deserialize;
use std::time::Duration;

use crate::adapters::{OutboxWorkerConfig, RetryPolicy};

use super::error::ValidationError;

/// Outbox worker settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    /// Poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Entries per poll cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Publish attempts before an entry is drained as poisoned.
    #[serde(default = "default_worker_max_retries")]
    pub max_retries: u32,

    /// Retention of processed entries, in hours.
    #[serde(default = "default_cleanup_age_hours")]
    pub cleanup_age_hours: u64,

    /// Cleanup cadence, in seconds.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl WorkerSettings {
    /// Validates the worker settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidBatchSize);
        }
        Ok(())
    }

    /// Converts to the worker's runtime configuration.
    pub fn to_worker_config(&self) -> OutboxWorkerConfig {
        OutboxWorkerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            batch_size: self.batch_size,
            max_retries: self.max_retries,
            cleanup_age: Duration::from_secs(self.cleanup_age_hours * 60 * 60),
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
            enabled: self.enabled,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
            max_retries: default_worker_max_retries(),
            cleanup_age_hours: default_cleanup_age_hours(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            enabled: default_enabled(),
        }
    }
}

/// Event bus settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BusSettings {
    /// Handler retries after the first attempt.
    #[serde(default = "default_bus_max_retries")]
    pub max_retries: u32,

    /// First backoff, in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Multiplier applied per retry.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Channel prefix isolating bus instances on a shared broker.
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,

    /// Dead letters retained before the oldest are dropped.
    #[serde(default = "default_dead_letter_capacity")]
    pub dead_letter_capacity: usize,
}

impl BusSettings {
    /// Validates the bus settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.backoff_factor < 1.0 {
            return Err(ValidationError::InvalidBackoffFactor);
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(ValidationError::InvalidBackoffRange);
        }
        Ok(())
    }

    /// Converts to the dispatcher's retry policy.
    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            backoff_factor: self.backoff_factor,
        }
    }
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            max_retries: default_bus_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_factor: default_backoff_factor(),
            channel_prefix: default_channel_prefix(),
            dead_letter_capacity: default_dead_letter_capacity(),
        }
    }
}

/// Event pipeline configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsConfig {
    #[serde(default)]
    pub worker: WorkerSettings,

    #[serde(default)]
    pub bus: BusSettings,
}

impl EventsConfig {
    /// Validates the event pipeline configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.worker.validate()?;
        self.bus.validate()?;
        Ok(())
    }
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_batch_size() -> u32 {
    100
}

fn default_worker_max_retries() -> u32 {
    5
}

fn default_cleanup_age_hours() -> u64 {
    7 * 24
}

fn default_cleanup_interval_secs() -> u64 {
    60 * 60
}

fn default_enabled() -> bool {
    true
}

fn default_bus_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    5000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_channel_prefix() -> String {
    "events:".to_string()
}

fn default_dead_letter_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_defaults_match_the_documented_values() {
        let settings = WorkerSettings::default();
        let config = settings.to_worker_config();

        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.cleanup_age, Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(config.cleanup_interval, Duration::from_secs(60 * 60));
        assert!(config.enabled);
    }

    #[test]
    fn bus_defaults_match_the_documented_values() {
        let settings = BusSettings::default();
        let policy = settings.to_retry_policy();

        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(100));
        assert_eq!(policy.max_backoff, Duration::from_secs(5));
        assert_eq!(policy.backoff_factor, 2.0);
        assert_eq!(settings.channel_prefix, "events:");
    }

    #[test]
    fn zero_batch_size_fails_validation() {
        let settings = WorkerSettings { batch_size: 0, ..Default::default() };
        assert_eq!(settings.validate(), Err(ValidationError::InvalidBatchSize));
    }

    #[test]
    fn shrinking_backoff_factor_fails_validation() {
        let settings = BusSettings { backoff_factor: 0.5, ..Default::default() };
        assert_eq!(settings.validate(), Err(ValidationError::InvalidBackoffFactor));
    }

    #[test]
    fn inverted_backoff_range_fails_validation() {
        let settings = BusSettings {
            initial_backoff_ms: 1000,
            max_backoff_ms: 100,
            ..Default::default()
        };
        assert_eq!(settings.validate(), Err(ValidationError::InvalidBackoffRange));
    }
}
