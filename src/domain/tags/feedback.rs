//! Bot feedback formatter.
//!
//! Turns a processing result into the human-readable reply the
//! originating transport posts back into the chat. Returns an empty
//! string when no tags were processed, so silent messages stay silent.

use crate::domain::chat::Command;

use super::processor::{ProcessingResult, TagSeverity};

/// Formats the reply for one processed message.
pub fn format(result: &ProcessingResult) -> String {
    if !result.has_activity() {
        return String::new();
    }

    let mut lines = Vec::new();

    for command in &result.commands {
        lines.push(success_line(command));
    }

    for error in &result.errors {
        let prefix = match error.severity {
            TagSeverity::Error => "❌",
            TagSeverity::Warning => "⚠️",
        };
        lines.push(format!("{} {}", prefix, error.message));
    }

    lines.join("\n")
}

fn success_line(command: &Command) -> String {
    match command {
        Command::CreateTask { title, .. } => format!("✅ Task created: {}", title),
        Command::CreateBug { title, .. } => format!("✅ Bug created: {}", title),
        Command::CreateEpic { title, .. } => format!("✅ Epic created: {}", title),
        Command::ChangeStatus { status, .. } => format!("✅ Status changed to {}", status),
        Command::AssignUser { assignee: Some(name), .. } => format!("✅ Assigned to {}", name),
        Command::AssignUser { assignee: None, .. } => "✅ Unassigned".to_string(),
        Command::ChangePriority { priority, .. } => format!("✅ Priority set to {}", priority),
        Command::SetDueDate { due_date: Some(date), .. } => format!("✅ Due date set to {}", date),
        Command::SetDueDate { due_date: None, .. } => "✅ Due date cleared".to_string(),
        Command::ChangeTitle { title, .. } => format!("✅ Title changed to {}", title),
        Command::SetSeverity { severity, .. } => format!("✅ Severity set to {}", severity),
        Command::InviteUser { username, .. } => format!("✅ {} invited", username),
        Command::RemoveUser { username, .. } => format!("✅ {} removed", username),
        Command::CloseChat { .. } => "✅ Chat closed".to_string(),
        Command::ReopenChat { .. } => "✅ Chat reopened".to_string(),
        Command::DeleteChat { .. } => "✅ Chat deleted".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ChatId;
    use crate::domain::tags::processor::{AppliedTag, TagError};

    #[test]
    fn empty_result_formats_to_empty_string() {
        let result = ProcessingResult::default();
        assert_eq!(format(&result), "");
    }

    #[test]
    fn created_task_gets_a_checkmark_line() {
        let result = ProcessingResult {
            applied: vec![AppliedTag { key: "task".into(), value: "Ship it".into() }],
            commands: vec![Command::CreateTask {
                chat_id: ChatId::new(),
                title: "Ship it".into(),
            }],
            ..Default::default()
        };
        assert_eq!(format(&result), "✅ Task created: Ship it");
    }

    #[test]
    fn errors_and_warnings_use_distinct_prefixes() {
        let result = ProcessingResult {
            errors: vec![
                TagError {
                    tag: "status".into(),
                    message: "Invalid status 'Nope' for Task".into(),
                    severity: TagSeverity::Error,
                },
                TagError {
                    tag: "severity".into(),
                    message: "Severity applies only to bugs".into(),
                    severity: TagSeverity::Warning,
                },
            ],
            ..Default::default()
        };

        let reply = format(&result);
        assert!(reply.contains("❌ Invalid status 'Nope' for Task"));
        assert!(reply.contains("⚠️ Severity applies only to bugs"));
    }

    #[test]
    fn successes_come_before_errors() {
        let chat_id = ChatId::new();
        let result = ProcessingResult {
            applied: vec![AppliedTag { key: "priority".into(), value: "High".into() }],
            commands: vec![Command::ChangePriority {
                chat_id,
                priority: crate::domain::chat::Priority::High,
            }],
            errors: vec![TagError {
                tag: "due".into(),
                message: "Invalid date".into(),
                severity: TagSeverity::Error,
            }],
            ..Default::default()
        };

        let reply = format(&result);
        let success_pos = reply.find("✅").unwrap();
        let error_pos = reply.find("❌").unwrap();
        assert!(success_pos < error_pos);
    }

    #[test]
    fn unassign_has_its_own_wording() {
        let result = ProcessingResult {
            applied: vec![AppliedTag { key: "assignee".into(), value: "".into() }],
            commands: vec![Command::AssignUser { chat_id: ChatId::new(), assignee: None }],
            ..Default::default()
        };
        assert_eq!(format(&result), "✅ Unassigned");
    }
}
