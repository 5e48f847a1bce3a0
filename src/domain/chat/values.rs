//! Value objects for the chat aggregate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a chat thread.
///
/// Every chat starts as a Discussion. A Discussion can be converted to
/// exactly one of the work-item kinds; work-item kinds never convert
/// again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatKind {
    Discussion,
    Task,
    Bug,
    Epic,
}

impl ChatKind {
    /// Statuses allowed for this kind, in workflow order. Comparison is
    /// case-sensitive everywhere.
    pub fn allowed_statuses(&self) -> &'static [&'static str] {
        match self {
            ChatKind::Discussion => &[],
            ChatKind::Task => &["To Do", "In Progress", "Done", "Cancelled"],
            ChatKind::Bug => &["Open", "In Progress", "Fixed", "Verified", "Closed"],
            ChatKind::Epic => &["Open", "In Progress", "Done"],
        }
    }

    /// Status a freshly converted chat of this kind starts in.
    pub fn initial_status(&self) -> Option<&'static str> {
        self.allowed_statuses().first().copied()
    }

    /// Whether the given status belongs to this kind's workflow.
    pub fn is_valid_status(&self, status: &str) -> bool {
        self.allowed_statuses().contains(&status)
    }

    /// Whether this kind represents a work item (anything but Discussion).
    pub fn is_work_item(&self) -> bool {
        !matches!(self, ChatKind::Discussion)
    }
}

impl fmt::Display for ChatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChatKind::Discussion => "Discussion",
            ChatKind::Task => "Task",
            ChatKind::Bug => "Bug",
            ChatKind::Epic => "Epic",
        };
        write!(f, "{}", s)
    }
}

/// Work-item priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [&'static str; 3] = ["High", "Medium", "Low"];

    /// Parses a priority, case-sensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "High" => Some(Priority::High),
            "Medium" => Some(Priority::Medium),
            "Low" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        };
        write!(f, "{}", s)
    }
}

/// Bug severity. Only meaningful for chats of kind Bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Trivial,
}

impl Severity {
    pub const ALL: [&'static str; 4] = ["Critical", "Major", "Minor", "Trivial"];

    /// Parses a severity, case-sensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Critical" => Some(Severity::Critical),
            "Major" => Some(Severity::Major),
            "Minor" => Some(Severity::Minor),
            "Trivial" => Some(Severity::Trivial),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "Critical",
            Severity::Major => "Major",
            Severity::Minor => "Minor",
            Severity::Trivial => "Trivial",
        };
        write!(f, "{}", s)
    }
}

/// Role of a participant within a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Owner,
    Member,
}
