//! Error types shared across the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    EmptyField,
    InvalidFormat,

    // Not found errors
    ChatNotFound,
    UserNotFound,
    EntryNotFound,

    // State errors
    InvalidStateTransition,
    ConcurrencyConflict,

    // Infrastructure errors
    DatabaseError,
    BusError,
    SerializationFailed,
    UnknownEventType,
    Cancelled,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::EmptyField => "EMPTY_FIELD",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::ChatNotFound => "CHAT_NOT_FOUND",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::EntryNotFound => "ENTRY_NOT_FOUND",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::BusError => "BUS_ERROR",
            ErrorCode::SerializationFailed => "SERIALIZATION_FAILED",
            ErrorCode::UnknownEventType => "UNKNOWN_EVENT_TYPE",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            details: HashMap::new(),
        }
        .with_detail("field", field.into())
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Whether the error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::ConcurrencyConflict | ErrorCode::DatabaseError | ErrorCode::BusError
        )
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::ChatNotFound, "Chat not found");
        assert_eq!(format!("{}", err), "[CHAT_NOT_FOUND] Chat not found");
    }

    #[test]
    fn domain_error_with_detail_adds_detail() {
        let err = DomainError::new(ErrorCode::ValidationFailed, "Validation failed")
            .with_detail("field", "title")
            .with_detail("reason", "empty");

        assert_eq!(err.details.get("field"), Some(&"title".to_string()));
        assert_eq!(err.details.get("reason"), Some(&"empty".to_string()));
    }

    #[test]
    fn validation_helper_records_field() {
        let err = DomainError::validation("status", "Unknown status");
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.details.get("field"), Some(&"status".to_string()));
    }

    #[test]
    fn transient_codes_are_retryable() {
        assert!(DomainError::new(ErrorCode::ConcurrencyConflict, "conflict").is_retryable());
        assert!(DomainError::new(ErrorCode::DatabaseError, "timeout").is_retryable());
        assert!(!DomainError::new(ErrorCode::ChatNotFound, "missing").is_retryable());
    }

    #[test]
    fn error_code_display_formats_correctly() {
        assert_eq!(format!("{}", ErrorCode::ChatNotFound), "CHAT_NOT_FOUND");
        assert_eq!(format!("{}", ErrorCode::UnknownEventType), "UNKNOWN_EVENT_TYPE");
    }
}
