//! Commands targeting the chat aggregate.
//!
//! Usernames inside commands (`assignee`, `username`) are unresolved
//! `@handle` strings; the command executor resolves them against the user
//! directory before the aggregate ever sees them.

use chrono::NaiveDate;

use crate::domain::foundation::ChatId;

use super::values::{Priority, Severity};

/// A request to mutate a chat aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateTask { chat_id: ChatId, title: String },
    CreateBug { chat_id: ChatId, title: String },
    CreateEpic { chat_id: ChatId, title: String },
    ChangeStatus { chat_id: ChatId, status: String },
    /// `None` unassigns the work item.
    AssignUser { chat_id: ChatId, assignee: Option<String> },
    ChangePriority { chat_id: ChatId, priority: Priority },
    /// `None` clears the due date.
    SetDueDate { chat_id: ChatId, due_date: Option<NaiveDate> },
    ChangeTitle { chat_id: ChatId, title: String },
    SetSeverity { chat_id: ChatId, severity: Severity },
    InviteUser { chat_id: ChatId, username: String },
    RemoveUser { chat_id: ChatId, username: String },
    CloseChat { chat_id: ChatId },
    ReopenChat { chat_id: ChatId },
    DeleteChat { chat_id: ChatId },
}

impl Command {
    /// The chat this command targets.
    pub fn chat_id(&self) -> ChatId {
        match self {
            Command::CreateTask { chat_id, .. }
            | Command::CreateBug { chat_id, .. }
            | Command::CreateEpic { chat_id, .. }
            | Command::ChangeStatus { chat_id, .. }
            | Command::AssignUser { chat_id, .. }
            | Command::ChangePriority { chat_id, .. }
            | Command::SetDueDate { chat_id, .. }
            | Command::ChangeTitle { chat_id, .. }
            | Command::SetSeverity { chat_id, .. }
            | Command::InviteUser { chat_id, .. }
            | Command::RemoveUser { chat_id, .. }
            | Command::CloseChat { chat_id }
            | Command::ReopenChat { chat_id }
            | Command::DeleteChat { chat_id } => *chat_id,
        }
    }

    /// Stable name used in logs and bot feedback.
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateTask { .. } => "create_task",
            Command::CreateBug { .. } => "create_bug",
            Command::CreateEpic { .. } => "create_epic",
            Command::ChangeStatus { .. } => "change_status",
            Command::AssignUser { .. } => "assign_user",
            Command::ChangePriority { .. } => "change_priority",
            Command::SetDueDate { .. } => "set_due_date",
            Command::ChangeTitle { .. } => "change_title",
            Command::SetSeverity { .. } => "set_severity",
            Command::InviteUser { .. } => "invite_user",
            Command::RemoveUser { .. } => "remove_user",
            Command::CloseChat { .. } => "close_chat",
            Command::ReopenChat { .. } => "reopen_chat",
            Command::DeleteChat { .. } => "delete_chat",
        }
    }
}
