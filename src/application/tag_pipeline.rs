//! Tag pipeline - from a raw chat message to executed commands and bot
//! feedback.
//!
//! One message flows through: parse (split tags from plain text) →
//! process (validate against the chat's current kind, emit commands) →
//! execute (each command through the executor) → format (the bot
//! reply). Commands that fail execution turn into result errors; the
//! ones that succeed keep their success line in the reply.

use std::sync::Arc;
use tracing::debug;

use crate::domain::chat::ChatKind;
use crate::domain::events::DomainEvent;
use crate::domain::foundation::ChatId;
use crate::domain::tags::{self, feedback, ProcessingResult, TagError, TagSeverity};
use crate::ports::ChatRepository;

use super::executor::{CommandContext, CommandExecutor, ExecutorError};

/// Outcome of handling one message.
#[derive(Debug)]
pub struct MessageOutcome {
    /// Final processing result: applied tags that actually executed,
    /// plus validation and execution errors.
    pub result: ProcessingResult,
    /// Events the executed commands appended, in order.
    pub events: Vec<DomainEvent>,
    /// Bot reply for the originating transport; empty when the message
    /// carried no tags.
    pub feedback: String,
}

/// The message-handling pipeline.
pub struct TagPipeline {
    repository: Arc<dyn ChatRepository>,
    executor: Arc<CommandExecutor>,
}

impl TagPipeline {
    pub fn new(repository: Arc<dyn ChatRepository>, executor: Arc<CommandExecutor>) -> Self {
        Self {
            repository,
            executor,
        }
    }

    /// Handles one message posted to a chat.
    pub async fn handle_message(
        &self,
        chat_id: ChatId,
        text: &str,
        ctx: &CommandContext,
    ) -> Result<MessageOutcome, ExecutorError> {
        let chat = self
            .repository
            .load(chat_id)
            .await
            .map_err(|err| match err {
                crate::ports::EventStoreError::AggregateNotFound(id) => {
                    ExecutorError::ChatNotFound(id)
                }
                other => ExecutorError::Store(other),
            })?;

        let parsed = tags::parse(text);
        let current_kind = match chat.kind() {
            ChatKind::Discussion => None,
            kind => Some(kind),
        };

        let mut processed = tags::process(chat_id, &parsed.tags, current_kind);
        processed.plain_text = parsed.plain_text;

        let mut events = Vec::new();
        let mut executed_applied = Vec::new();
        let mut executed_commands = Vec::new();
        let mut errors = std::mem::take(&mut processed.errors);

        for (applied, command) in processed
            .applied
            .iter()
            .zip(processed.commands.iter())
        {
            match self.executor.execute(command.clone(), ctx).await {
                Ok(mut stored) => {
                    debug!(
                        chat_id = %chat_id,
                        command = command.name(),
                        events = stored.len(),
                        "Tag command executed"
                    );
                    events.append(&mut stored);
                    executed_applied.push(applied.clone());
                    executed_commands.push(command.clone());
                }
                Err(err) => {
                    let severity = if err.is_warning() {
                        TagSeverity::Warning
                    } else {
                        TagSeverity::Error
                    };
                    errors.push(TagError {
                        tag: applied.key.clone(),
                        message: err.to_string(),
                        severity,
                    });
                }
            }
        }

        let result = ProcessingResult {
            plain_text: processed.plain_text,
            applied: executed_applied,
            errors,
            commands: executed_commands,
        };
        let feedback = feedback::format(&result);

        Ok(MessageOutcome {
            result,
            events,
            feedback,
        })
    }
}
