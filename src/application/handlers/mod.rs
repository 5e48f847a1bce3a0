//! Event consumers: the internal subscribers of the bus.

mod audit;
mod chat_projection;
mod notifications;
mod task_projection;

pub use audit::AuditLogHandler;
pub use chat_projection::ChatProjectionHandler;
pub use notifications::NotificationHandler;
pub use task_projection::TaskProjectionHandler;
