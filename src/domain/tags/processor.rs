//! Tag processor.
//!
//! Walks parsed tags in order, validates each against the chat's current
//! entity kind, and emits the commands the executor should run. Hard
//! validation failures carry error severity; tags that merely target the
//! wrong entity kind carry warning severity.

use chrono::NaiveDate;

use crate::domain::chat::{ChatKind, Command, Priority, Severity};
use crate::domain::foundation::ChatId;

use super::parser::ParsedTag;
use super::registry;

/// How severe a rejected tag is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSeverity {
    Error,
    Warning,
}

/// One rejected tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagError {
    pub tag: String,
    pub message: String,
    pub severity: TagSeverity,
}

impl TagError {
    fn error(tag: &str, message: impl Into<String>) -> Self {
        Self {
            tag: tag.to_string(),
            message: message.into(),
            severity: TagSeverity::Error,
        }
    }

    fn warning(tag: &str, message: impl Into<String>) -> Self {
        Self {
            tag: tag.to_string(),
            message: message.into(),
            severity: TagSeverity::Warning,
        }
    }
}

/// One successfully applied tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedTag {
    pub key: String,
    pub value: String,
}

/// Outcome of processing one message's tags.
///
/// `applied` and `commands` are index-aligned: `commands[i]` was emitted
/// by `applied[i]`.
#[derive(Debug, Clone, Default)]
pub struct ProcessingResult {
    /// The message minus its tag lines.
    pub plain_text: String,
    pub applied: Vec<AppliedTag>,
    pub errors: Vec<TagError>,
    pub commands: Vec<Command>,
}

impl ProcessingResult {
    /// Whether any tag was processed, successfully or not.
    pub fn has_activity(&self) -> bool {
        !self.applied.is_empty() || !self.errors.is_empty()
    }

    /// Errors with error severity only.
    pub fn hard_errors(&self) -> impl Iterator<Item = &TagError> {
        self.errors.iter().filter(|e| e.severity == TagSeverity::Error)
    }
}

/// Processes tags against the chat's current entity kind.
///
/// `current_kind` is `None` while the chat is still a Discussion; a
/// creation tag inside the batch sets it for the tags that follow.
pub fn process(chat_id: ChatId, tags: &[ParsedTag], current_kind: Option<ChatKind>) -> ProcessingResult {
    let mut result = ProcessingResult::default();
    let mut current = current_kind.filter(|kind| kind.is_work_item());

    for tag in tags {
        if registry::is_creation_tag(&tag.key) {
            process_creation_tag(chat_id, tag, &mut current, &mut result);
        } else {
            process_management_tag(chat_id, tag, current, &mut result);
        }
    }

    result
}

fn process_creation_tag(
    chat_id: ChatId,
    tag: &ParsedTag,
    current: &mut Option<ChatKind>,
    result: &mut ProcessingResult,
) {
    let title = tag.value.trim();
    if title.is_empty() {
        result.errors.push(TagError::error(
            &tag.key,
            format!("#{} requires a title", tag.key),
        ));
        return;
    }

    let (kind, command) = match tag.key.as_str() {
        "task" => (ChatKind::Task, Command::CreateTask { chat_id, title: title.to_string() }),
        "bug" => (ChatKind::Bug, Command::CreateBug { chat_id, title: title.to_string() }),
        _ => (ChatKind::Epic, Command::CreateEpic { chat_id, title: title.to_string() }),
    };

    *current = Some(kind);
    result.applied.push(AppliedTag {
        key: tag.key.clone(),
        value: title.to_string(),
    });
    result.commands.push(command);
}

fn process_management_tag(
    chat_id: ChatId,
    tag: &ParsedTag,
    current: Option<ChatKind>,
    result: &mut ProcessingResult,
) {
    let Some(spec) = registry::lookup(&tag.key) else {
        // Parser only emits registered tags; anything else is dropped.
        return;
    };

    let Some(kind) = current else {
        result.errors.push(TagError::error(
            &tag.key,
            format!("#{} has no active entity; create a task, bug, or epic first", tag.key),
        ));
        return;
    };

    let value = tag.value.trim();
    if value.is_empty() && spec.requires_value {
        result.errors.push(TagError::error(
            &tag.key,
            format!("#{} requires a value", tag.key),
        ));
        return;
    }

    let command = match spec.kind {
        registry::TagValueKind::Status => {
            if !kind.is_valid_status(value) {
                result.errors.push(TagError::error(
                    &tag.key,
                    format!(
                        "Invalid status '{}' for {}; allowed: {}",
                        value,
                        kind,
                        kind.allowed_statuses().join(", ")
                    ),
                ));
                return;
            }
            Command::ChangeStatus { chat_id, status: value.to_string() }
        }
        registry::TagValueKind::Username => {
            let assignee = match value {
                "" | "@none" => None,
                other => Some(other.to_string()),
            };
            Command::AssignUser { chat_id, assignee }
        }
        registry::TagValueKind::Priority => match Priority::parse(value) {
            Some(priority) => Command::ChangePriority { chat_id, priority },
            None => {
                result.errors.push(TagError::error(
                    &tag.key,
                    format!(
                        "Invalid priority '{}'; allowed: {}",
                        value,
                        Priority::ALL.join(", ")
                    ),
                ));
                return;
            }
        },
        registry::TagValueKind::Date => {
            if value.is_empty() {
                Command::SetDueDate { chat_id, due_date: None }
            } else {
                match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
                    Ok(date) => Command::SetDueDate { chat_id, due_date: Some(date) },
                    Err(_) => {
                        result.errors.push(TagError::error(
                            &tag.key,
                            format!("Invalid date '{}'; expected YYYY-MM-DD", value),
                        ));
                        return;
                    }
                }
            }
        }
        registry::TagValueKind::Severity => {
            if kind != ChatKind::Bug {
                result.errors.push(TagError::warning(
                    &tag.key,
                    format!("Severity applies only to bugs, not to a {}", kind),
                ));
                return;
            }
            match Severity::parse(value) {
                Some(severity) => Command::SetSeverity { chat_id, severity },
                None => {
                    result.errors.push(TagError::error(
                        &tag.key,
                        format!(
                            "Invalid severity '{}'; allowed: {}",
                            value,
                            Severity::ALL.join(", ")
                        ),
                    ));
                    return;
                }
            }
        }
        registry::TagValueKind::Text => {
            Command::ChangeTitle { chat_id, title: value.to_string() }
        }
    };

    result.applied.push(AppliedTag {
        key: tag.key.clone(),
        value: value.to_string(),
    });
    result.commands.push(command);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Vec<ParsedTag> {
        pairs
            .iter()
            .map(|(k, v)| ParsedTag {
                key: k.to_string(),
                value: v.to_string(),
            })
            .collect()
    }

    #[test]
    fn creation_tag_emits_create_command() {
        let chat_id = ChatId::new();
        let result = process(chat_id, &tags(&[("task", "Implement OAuth")]), None);

        assert_eq!(
            result.commands,
            vec![Command::CreateTask { chat_id, title: "Implement OAuth".to_string() }]
        );
        assert!(result.errors.is_empty());
    }

    #[test]
    fn creation_tag_with_empty_title_errors() {
        let result = process(ChatId::new(), &tags(&[("task", "  ")]), None);
        assert!(result.commands.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].severity, TagSeverity::Error);
    }

    #[test]
    fn creation_tag_activates_entity_for_following_tags() {
        let chat_id = ChatId::new();
        let result = process(
            chat_id,
            &tags(&[("task", "Build it"), ("status", "In Progress"), ("priority", "High")]),
            None,
        );

        assert_eq!(result.commands.len(), 3);
        assert!(result.errors.is_empty());
        assert!(matches!(result.commands[1], Command::ChangeStatus { .. }));
        assert!(matches!(
            result.commands[2],
            Command::ChangePriority { priority: Priority::High, .. }
        ));
    }

    #[test]
    fn management_tag_without_entity_errors() {
        let result = process(ChatId::new(), &tags(&[("status", "Done")]), None);
        assert!(result.commands.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("no active entity"));
    }

    #[test]
    fn discussion_kind_counts_as_no_entity() {
        let result = process(
            ChatId::new(),
            &tags(&[("status", "Done")]),
            Some(ChatKind::Discussion),
        );
        assert!(result.commands.is_empty());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn status_is_validated_against_current_kind() {
        let result = process(ChatId::new(), &tags(&[("status", "Fixed")]), Some(ChatKind::Task));
        assert!(result.commands.is_empty());
        assert!(result.errors[0].message.contains("Invalid status 'Fixed' for Task"));
    }

    #[test]
    fn status_done_is_valid_on_task() {
        let result = process(ChatId::new(), &tags(&[("status", "Done")]), Some(ChatKind::Task));
        assert_eq!(result.commands.len(), 1);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn assignee_none_and_empty_both_unassign() {
        for value in ["@none", ""] {
            let result = process(
                ChatId::new(),
                &tags(&[("assignee", value)]),
                Some(ChatKind::Task),
            );
            assert_eq!(result.commands.len(), 1, "value {:?}", value);
            assert!(matches!(
                &result.commands[0],
                Command::AssignUser { assignee: None, .. }
            ));
        }
    }

    #[test]
    fn assignee_with_username_passes_through_unresolved() {
        let result = process(
            ChatId::new(),
            &tags(&[("assignee", "@alex")]),
            Some(ChatKind::Task),
        );
        assert!(matches!(
            &result.commands[0],
            Command::AssignUser { assignee: Some(name), .. } if name == "@alex"
        ));
    }

    #[test]
    fn empty_due_date_unsets() {
        let result = process(ChatId::new(), &tags(&[("due", "")]), Some(ChatKind::Task));
        assert!(matches!(
            &result.commands[0],
            Command::SetDueDate { due_date: None, .. }
        ));
    }

    #[test]
    fn malformed_due_date_errors() {
        let result = process(
            ChatId::new(),
            &tags(&[("due", "next tuesday")]),
            Some(ChatKind::Task),
        );
        assert!(result.commands.is_empty());
        assert!(result.errors[0].message.contains("YYYY-MM-DD"));
    }

    #[test]
    fn severity_on_task_is_a_warning() {
        let result = process(
            ChatId::new(),
            &tags(&[("severity", "Major")]),
            Some(ChatKind::Task),
        );
        assert!(result.commands.is_empty());
        assert_eq!(result.errors[0].severity, TagSeverity::Warning);
    }

    #[test]
    fn severity_on_bug_is_accepted() {
        let result = process(
            ChatId::new(),
            &tags(&[("severity", "Critical")]),
            Some(ChatKind::Bug),
        );
        assert!(matches!(
            &result.commands[0],
            Command::SetSeverity { severity: Severity::Critical, .. }
        ));
    }

    #[test]
    fn one_bad_tag_does_not_block_the_rest() {
        let result = process(
            ChatId::new(),
            &tags(&[("status", "Nope"), ("priority", "Low")]),
            Some(ChatKind::Task),
        );
        assert_eq!(result.commands.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert!(matches!(result.commands[0], Command::ChangePriority { .. }));
    }

    #[test]
    fn applied_and_commands_stay_index_aligned() {
        let result = process(
            ChatId::new(),
            &tags(&[("task", "X"), ("status", "bad"), ("priority", "Low")]),
            None,
        );
        assert_eq!(result.applied.len(), result.commands.len());
        assert_eq!(result.applied[0].key, "task");
        assert_eq!(result.applied[1].key, "priority");
    }

    #[test]
    fn repeated_identical_tags_emit_identical_commands() {
        let chat_id = ChatId::new();
        let batch = tags(&[("status", "Done")]);
        let first = process(chat_id, &batch, Some(ChatKind::Task));
        let second = process(chat_id, &batch, Some(ChatKind::Task));
        assert_eq!(first.commands, second.commands);
    }
}
