//! Errors produced by chat aggregate commands.

use thiserror::Error;

use crate::domain::foundation::UserId;

use super::values::ChatKind;

/// Maximum length for a chat title.
pub const MAX_TITLE_LENGTH: usize = 500;

/// Rejections raised when a command conflicts with the aggregate state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChatError {
    #[error("Title cannot be empty")]
    EmptyTitle,

    #[error("Title must be {MAX_TITLE_LENGTH} characters or less")]
    TitleTooLong,

    #[error("Chat is already a {current}; only a Discussion can be converted")]
    AlreadyConverted { current: ChatKind },

    #[error("A {kind} has no status workflow")]
    StatusNotSupported { kind: ChatKind },

    #[error("Invalid status '{status}' for {kind}")]
    UnknownStatus { status: String, kind: ChatKind },

    #[error("Severity applies only to bugs, not to a {kind}")]
    SeverityRequiresBug { kind: ChatKind },

    #[error("User {user_id} is already a participant")]
    AlreadyParticipant { user_id: UserId },

    #[error("User {user_id} is not a participant")]
    NotParticipant { user_id: UserId },

    #[error("Chat is already closed")]
    AlreadyClosed,

    #[error("Chat is not closed")]
    NotClosed,

    #[error("Chat has been deleted")]
    Deleted,
}

impl ChatError {
    /// Whether the rejection is advisory rather than a hard failure.
    ///
    /// Matches the tag-processing contract: applying a tag to the wrong
    /// entity kind warns, everything else errors.
    pub fn is_warning(&self) -> bool {
        matches!(self, ChatError::SeverityRequiresBug { .. })
    }
}
