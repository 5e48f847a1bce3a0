//! Application configuration.
//!
//! Type-safe configuration loaded from environment variables with the
//! `THREADWORK` prefix; nested values use double underscores:
//!
//! - `THREADWORK__DATABASE__URL=postgres://…` -> `database.url`
//! - `THREADWORK__EVENTS__WORKER__BATCH_SIZE=50` ->
//!   `events.worker.batch_size`

mod database;
mod error;
mod events;
mod redis;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use events::{BusSettings, EventsConfig, WorkerSettings};
pub use redis::RedisConfig;

use serde::Deserialize;

/// Root application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection.
    pub database: DatabaseConfig,

    /// Redis connection (event bus broker).
    pub redis: RedisConfig,

    /// Outbox worker and event bus settings.
    #[serde(default)]
    pub events: EventsConfig,
}

impl AppConfig {
    /// Loads configuration from the environment.
    ///
    /// Reads a `.env` file first when present (development), then
    /// environment variables with the `THREADWORK` prefix.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("THREADWORK")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validates all configuration sections.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.redis.validate()?;
        self.events.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global; serialize the tests that touch them.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var("THREADWORK__DATABASE__URL", "postgresql://test@localhost/test");
        env::set_var("THREADWORK__REDIS__URL", "redis://localhost:6379");
    }

    fn clear_env() {
        env::remove_var("THREADWORK__DATABASE__URL");
        env::remove_var("THREADWORK__REDIS__URL");
        env::remove_var("THREADWORK__EVENTS__WORKER__BATCH_SIZE");
        env::remove_var("THREADWORK__EVENTS__BUS__CHANNEL_PREFIX");
    }

    #[test]
    fn loads_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(config.database.url, "postgresql://test@localhost/test");
        assert_eq!(config.redis.url, "redis://localhost:6379");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn events_section_defaults_when_absent() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.events.worker.batch_size, 100);
        assert_eq!(config.events.bus.channel_prefix, "events:");
    }

    #[test]
    fn nested_overrides_are_applied() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("THREADWORK__EVENTS__WORKER__BATCH_SIZE", "25");
        env::set_var("THREADWORK__EVENTS__BUS__CHANNEL_PREFIX", "staging:");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.events.worker.batch_size, 25);
        assert_eq!(config.events.bus.channel_prefix, "staging:");
    }
}
