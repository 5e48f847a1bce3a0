//! Configuration error types.

use thiserror::Error;

/// Errors while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Errors found when validating loaded configuration values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required configuration value {0} is missing")]
    MissingRequired(&'static str),

    #[error("DATABASE_URL must start with postgres:// or postgresql://")]
    InvalidDatabaseUrl,

    #[error("REDIS_URL must start with redis:// or rediss://")]
    InvalidRedisUrl,

    #[error("Pool size must be greater than zero")]
    InvalidPoolSize,

    #[error("Worker batch size must be greater than zero")]
    InvalidBatchSize,

    #[error("Backoff factor must be at least 1.0")]
    InvalidBackoffFactor,

    #[error("Max backoff must not be smaller than initial backoff")]
    InvalidBackoffRange,
}
