//! Command executor - maps commands onto the chat aggregate.
//!
//! A thin dispatch layer: resolve usernames once at entry, load the
//! aggregate, invoke the matching method, save. An optimistic-lock
//! conflict is retried exactly once by reloading and reapplying; a
//! second conflict surfaces to the caller.

use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::domain::chat::{Chat, ChatError, Command, ParticipantRole};
use crate::domain::events::DomainEvent;
use crate::domain::foundation::{ChatId, DomainError, EventMetadata, UserId, WorkspaceId};
use crate::ports::{ChatRepository, EventStoreError, UserDirectory};

/// Ambient context of one command: who issued it and how to trace it.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub user_id: UserId,
    pub correlation_id: Option<String>,
    pub causation_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl CommandContext {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id,
            correlation_id: None,
            causation_id: None,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Event metadata for events this command produces.
    pub fn metadata(&self) -> EventMetadata {
        let mut metadata = EventMetadata::for_user(self.user_id);
        metadata.correlation_id = self.correlation_id.clone();
        metadata.causation_id = self.causation_id.clone();
        metadata.ip_address = self.ip_address.clone();
        metadata.user_agent = self.user_agent.clone();
        metadata
    }
}

/// Errors surfaced by the executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("{0}")]
    Chat(#[from] ChatError),

    #[error("Chat {0} not found")]
    ChatNotFound(ChatId),

    #[error("User '@{0}' not found")]
    UnknownUser(String),

    #[error("User directory lookup failed: {0}")]
    Directory(DomainError),

    #[error(transparent)]
    Store(EventStoreError),
}

impl ExecutorError {
    /// Whether the failure is advisory (wrong-kind tag) rather than hard.
    pub fn is_warning(&self) -> bool {
        matches!(self, ExecutorError::Chat(err) if err.is_warning())
    }
}

fn map_store(err: EventStoreError) -> ExecutorError {
    match err {
        EventStoreError::AggregateNotFound(id) => ExecutorError::ChatNotFound(id),
        other => ExecutorError::Store(other),
    }
}

/// A command with every username replaced by a user id.
#[derive(Debug, Clone)]
enum ResolvedCommand {
    CreateTask { title: String },
    CreateBug { title: String },
    CreateEpic { title: String },
    ChangeStatus { status: String },
    AssignUser { assignee: Option<UserId> },
    ChangePriority { priority: crate::domain::chat::Priority },
    SetDueDate { due_date: Option<chrono::NaiveDate> },
    ChangeTitle { title: String },
    SetSeverity { severity: crate::domain::chat::Severity },
    InviteUser { user_id: UserId },
    RemoveUser { user_id: UserId },
    CloseChat,
    ReopenChat,
    DeleteChat,
}

/// Executes commands against chat aggregates.
pub struct CommandExecutor {
    repository: Arc<dyn ChatRepository>,
    directory: Arc<dyn UserDirectory>,
}

impl CommandExecutor {
    pub fn new(repository: Arc<dyn ChatRepository>, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            repository,
            directory,
        }
    }

    /// Opens a new Discussion chat. Not tag-reachable; transports call
    /// this when a conversation is started.
    pub async fn create_chat(
        &self,
        workspace_id: WorkspaceId,
        title: String,
        ctx: &CommandContext,
    ) -> Result<ChatId, ExecutorError> {
        let mut chat = Chat::create(ChatId::new(), workspace_id, title, ctx.user_id)?;
        self.repository
            .save(&mut chat, ctx.metadata())
            .await
            .map_err(map_store)?;
        Ok(chat.id())
    }

    /// Executes one command, retrying once on a concurrency conflict.
    ///
    /// Returns the events the command appended to the log.
    pub async fn execute(
        &self,
        command: Command,
        ctx: &CommandContext,
    ) -> Result<Vec<DomainEvent>, ExecutorError> {
        let chat_id = command.chat_id();
        let resolved = self.resolve(command).await?;

        let mut chat = self.load(chat_id).await?;
        apply(&mut chat, &resolved)?;

        match self.repository.save(&mut chat, ctx.metadata()).await {
            Ok(events) => Ok(events),
            Err(err) if err.is_concurrency_conflict() => {
                warn!(
                    chat_id = %chat_id,
                    "Concurrency conflict; reloading and reapplying once"
                );
                let mut chat = self.load(chat_id).await?;
                apply(&mut chat, &resolved)?;
                self.repository
                    .save(&mut chat, ctx.metadata())
                    .await
                    .map_err(map_store)
            }
            Err(err) => Err(map_store(err)),
        }
    }

    async fn load(&self, chat_id: ChatId) -> Result<Chat, ExecutorError> {
        self.repository.load(chat_id).await.map_err(map_store)
    }

    /// Resolves usernames to ids so handlers downstream never see raw
    /// `@handles`.
    async fn resolve(&self, command: Command) -> Result<ResolvedCommand, ExecutorError> {
        let resolved = match command {
            Command::CreateTask { title, .. } => ResolvedCommand::CreateTask { title },
            Command::CreateBug { title, .. } => ResolvedCommand::CreateBug { title },
            Command::CreateEpic { title, .. } => ResolvedCommand::CreateEpic { title },
            Command::ChangeStatus { status, .. } => ResolvedCommand::ChangeStatus { status },
            Command::AssignUser { assignee, .. } => {
                let assignee = match assignee.as_deref() {
                    None => None,
                    Some(username) => Some(self.lookup(username).await?),
                };
                ResolvedCommand::AssignUser { assignee }
            }
            Command::ChangePriority { priority, .. } => {
                ResolvedCommand::ChangePriority { priority }
            }
            Command::SetDueDate { due_date, .. } => ResolvedCommand::SetDueDate { due_date },
            Command::ChangeTitle { title, .. } => ResolvedCommand::ChangeTitle { title },
            Command::SetSeverity { severity, .. } => ResolvedCommand::SetSeverity { severity },
            Command::InviteUser { username, .. } => ResolvedCommand::InviteUser {
                user_id: self.lookup(&username).await?,
            },
            Command::RemoveUser { username, .. } => ResolvedCommand::RemoveUser {
                user_id: self.lookup(&username).await?,
            },
            Command::CloseChat { .. } => ResolvedCommand::CloseChat,
            Command::ReopenChat { .. } => ResolvedCommand::ReopenChat,
            Command::DeleteChat { .. } => ResolvedCommand::DeleteChat,
        };
        Ok(resolved)
    }

    async fn lookup(&self, username: &str) -> Result<UserId, ExecutorError> {
        let handle = username.strip_prefix('@').unwrap_or(username);
        let record = self
            .directory
            .find_by_username(handle)
            .await
            .map_err(ExecutorError::Directory)?;

        match record {
            Some(record) => Ok(record.user_id),
            None => Err(ExecutorError::UnknownUser(handle.to_string())),
        }
    }
}

fn apply(chat: &mut Chat, command: &ResolvedCommand) -> Result<(), ChatError> {
    use crate::domain::chat::ChatKind;

    match command {
        ResolvedCommand::CreateTask { title } => chat.convert_to(ChatKind::Task, title.clone()),
        ResolvedCommand::CreateBug { title } => chat.convert_to(ChatKind::Bug, title.clone()),
        ResolvedCommand::CreateEpic { title } => chat.convert_to(ChatKind::Epic, title.clone()),
        ResolvedCommand::ChangeStatus { status } => chat.change_status(status),
        ResolvedCommand::AssignUser { assignee } => chat.assign(*assignee),
        ResolvedCommand::ChangePriority { priority } => chat.set_priority(*priority),
        ResolvedCommand::SetDueDate { due_date } => chat.set_due_date(*due_date),
        ResolvedCommand::ChangeTitle { title } => chat.rename(title.clone()),
        ResolvedCommand::SetSeverity { severity } => chat.set_severity(*severity),
        ResolvedCommand::InviteUser { user_id } => chat.invite(*user_id, ParticipantRole::Member),
        ResolvedCommand::RemoveUser { user_id } => chat.remove(*user_id),
        ResolvedCommand::CloseChat => chat.close(),
        ResolvedCommand::ReopenChat => chat.reopen(),
        ResolvedCommand::DeleteChat => chat.delete(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::adapters::{in_memory_store, EventSourcedChatRepository};
    use crate::domain::chat::{ChatKind, Priority};
    use crate::ports::UserRecord;

    struct StubDirectory {
        users: Mutex<HashMap<String, UserRecord>>,
    }

    impl StubDirectory {
        fn with_users(names: &[&str]) -> Arc<Self> {
            let users = names
                .iter()
                .map(|name| {
                    (
                        name.to_string(),
                        UserRecord {
                            user_id: UserId::new(),
                            username: name.to_string(),
                            display_name: None,
                            is_admin: false,
                        },
                    )
                })
                .collect();
            Arc::new(Self {
                users: Mutex::new(users),
            })
        }
    }

    #[async_trait]
    impl UserDirectory for StubDirectory {
        async fn find_by_username(
            &self,
            username: &str,
        ) -> Result<Option<UserRecord>, DomainError> {
            Ok(self.users.lock().unwrap().get(username).cloned())
        }

        async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, DomainError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .values()
                .find(|r| r.user_id == user_id)
                .cloned())
        }
    }

    fn executor_with(users: &[&str]) -> (CommandExecutor, Arc<dyn ChatRepository>) {
        let (store, _) = in_memory_store();
        let repository: Arc<dyn ChatRepository> =
            Arc::new(EventSourcedChatRepository::new(store));
        let executor = CommandExecutor::new(Arc::clone(&repository), StubDirectory::with_users(users));
        (executor, repository)
    }

    fn ctx() -> CommandContext {
        CommandContext::for_user(UserId::new()).with_correlation_id("test-correlation")
    }

    async fn discussion(executor: &CommandExecutor) -> ChatId {
        executor
            .create_chat(WorkspaceId::new(), "Planning".to_string(), &ctx())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_task_via_command_converts_the_chat() {
        let (executor, repository) = executor_with(&[]);
        let chat_id = discussion(&executor).await;

        let events = executor
            .execute(
                Command::CreateTask { chat_id, title: "Implement OAuth".to_string() },
                &ctx(),
            )
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "chat.type_changed");
        assert_eq!(events[0].version, 2);

        let chat = repository.load(chat_id).await.unwrap();
        assert_eq!(chat.kind(), ChatKind::Task);
        assert_eq!(chat.status(), Some("To Do"));
    }

    #[tokio::test]
    async fn assign_resolves_username_to_id() {
        let (executor, repository) = executor_with(&["alex"]);
        let chat_id = discussion(&executor).await;
        executor
            .execute(Command::CreateTask { chat_id, title: "T".to_string() }, &ctx())
            .await
            .unwrap();

        executor
            .execute(
                Command::AssignUser { chat_id, assignee: Some("@alex".to_string()) },
                &ctx(),
            )
            .await
            .unwrap();

        let chat = repository.load(chat_id).await.unwrap();
        assert!(chat.assignee().is_some());
    }

    #[tokio::test]
    async fn assign_unknown_user_is_rejected_before_the_aggregate() {
        let (executor, repository) = executor_with(&[]);
        let chat_id = discussion(&executor).await;
        executor
            .execute(Command::CreateTask { chat_id, title: "T".to_string() }, &ctx())
            .await
            .unwrap();

        let result = executor
            .execute(
                Command::AssignUser { chat_id, assignee: Some("@ghost".to_string()) },
                &ctx(),
            )
            .await;

        assert!(matches!(result, Err(ExecutorError::UnknownUser(name)) if name == "ghost"));
        let chat = repository.load(chat_id).await.unwrap();
        assert_eq!(chat.version(), 2);
    }

    #[tokio::test]
    async fn unassign_needs_no_directory_lookup() {
        let (executor, _) = executor_with(&[]);
        let chat_id = discussion(&executor).await;
        executor
            .execute(Command::CreateTask { chat_id, title: "T".to_string() }, &ctx())
            .await
            .unwrap();

        let events = executor
            .execute(Command::AssignUser { chat_id, assignee: None }, &ctx())
            .await
            .unwrap();
        assert_eq!(events[0].event_type(), "chat.user_assigned");
    }

    #[tokio::test]
    async fn conflict_is_retried_by_reloading() {
        // Two executors over the same store race on one chat; the loser
        // must reload at the winner's version and succeed on retry.
        let (store, _) = in_memory_store();
        let repository: Arc<dyn ChatRepository> =
            Arc::new(EventSourcedChatRepository::new(store));
        let executor_a =
            CommandExecutor::new(Arc::clone(&repository), StubDirectory::with_users(&[]));
        let executor_b =
            CommandExecutor::new(Arc::clone(&repository), StubDirectory::with_users(&[]));

        let chat_id = executor_a
            .create_chat(WorkspaceId::new(), "Race".to_string(), &ctx())
            .await
            .unwrap();
        executor_a
            .execute(Command::CreateTask { chat_id, title: "T".to_string() }, &ctx())
            .await
            .unwrap();

        // Both apply priority; interleave by loading stale state via a
        // pre-staged conflicting write.
        let ctx_a = ctx();
        let ctx_b = ctx();
        let first = executor_a.execute(
            Command::ChangePriority { chat_id, priority: Priority::High },
            &ctx_a,
        );
        let second = executor_b.execute(
            Command::ChangePriority { chat_id, priority: Priority::High },
            &ctx_b,
        );
        let (first, second) = tokio::join!(first, second);
        first.unwrap();
        second.unwrap();

        let chat = repository.load(chat_id).await.unwrap();
        // Both priority events landed, at versions 3 and 4.
        assert_eq!(chat.version(), 4);
        assert_eq!(chat.priority(), Some(Priority::High));
    }

    #[tokio::test]
    async fn severity_on_task_surfaces_as_warning() {
        let (executor, _) = executor_with(&[]);
        let chat_id = discussion(&executor).await;
        executor
            .execute(Command::CreateTask { chat_id, title: "T".to_string() }, &ctx())
            .await
            .unwrap();

        let result = executor
            .execute(
                Command::SetSeverity {
                    chat_id,
                    severity: crate::domain::chat::Severity::Major,
                },
                &ctx(),
            )
            .await;

        let err = result.unwrap_err();
        assert!(err.is_warning());
    }

    #[tokio::test]
    async fn unknown_chat_is_not_found() {
        let (executor, _) = executor_with(&[]);
        let result = executor
            .execute(Command::CloseChat { chat_id: ChatId::new() }, &ctx())
            .await;
        assert!(matches!(result, Err(ExecutorError::ChatNotFound(_))));
    }
}
