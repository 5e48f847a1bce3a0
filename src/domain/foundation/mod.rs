//! Foundation value objects shared by every domain module.

mod errors;
mod events;
mod ids;
mod timestamp;

pub use errors::{DomainError, ErrorCode};
pub use events::{EventEnvelope, EventMetadata};
pub use ids::{ChatId, EventId, UserId, WorkspaceId};
pub use timestamp::Timestamp;
