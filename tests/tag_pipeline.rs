//! Integration tests for the tag-command pipeline and the optimistic
//! concurrency path, plus a property test for the parser.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use threadwork::adapters::{in_memory_store, EventSourcedChatRepository};
use threadwork::application::{CommandContext, CommandExecutor, TagPipeline};
use threadwork::domain::chat::{ChatKind, Priority};
use threadwork::domain::foundation::{DomainError, EventMetadata, UserId, WorkspaceId};
use threadwork::domain::tags;
use threadwork::ports::{ChatRepository, EventStoreError, UserDirectory, UserRecord};

struct FixedDirectory {
    users: Mutex<Vec<UserRecord>>,
}

impl FixedDirectory {
    fn with_usernames(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            users: Mutex::new(
                names
                    .iter()
                    .map(|name| UserRecord {
                        user_id: UserId::new(),
                        username: name.to_string(),
                        display_name: None,
                        is_admin: false,
                    })
                    .collect(),
            ),
        })
    }
}

#[async_trait]
impl UserDirectory for FixedDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, DomainError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.username == username)
            .cloned())
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, DomainError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.user_id == user_id)
            .cloned())
    }
}

struct Fixture {
    pipeline: TagPipeline,
    repository: Arc<dyn ChatRepository>,
    chat_id: threadwork::domain::foundation::ChatId,
    ctx: CommandContext,
}

async fn fixture(usernames: &[&str]) -> Fixture {
    let (store, _) = in_memory_store();
    let repository: Arc<dyn ChatRepository> = Arc::new(EventSourcedChatRepository::new(store));
    let executor = Arc::new(CommandExecutor::new(
        Arc::clone(&repository),
        FixedDirectory::with_usernames(usernames),
    ));
    let ctx = CommandContext::for_user(UserId::new());
    let chat_id = executor
        .create_chat(WorkspaceId::new(), "Planning".to_string(), &ctx)
        .await
        .unwrap();

    Fixture {
        pipeline: TagPipeline::new(Arc::clone(&repository), executor),
        repository,
        chat_id,
        ctx,
    }
}

// =============================================================================
// Scenario: mixed tag and plain-text lines on a task chat
// =============================================================================

#[tokio::test]
async fn mixed_lines_produce_both_commands_and_clean_plain_text() {
    let fx = fixture(&["alex"]).await;
    fx.pipeline
        .handle_message(fx.chat_id, "#task Implement OAuth", &fx.ctx)
        .await
        .unwrap();

    let outcome = fx
        .pipeline
        .handle_message(
            fx.chat_id,
            "Finished work\n#status Done #assignee @alex\nmore text",
            &fx.ctx,
        )
        .await
        .unwrap();

    assert_eq!(outcome.result.plain_text, "Finished work\nmore text");
    assert!(outcome.result.errors.is_empty());
    assert_eq!(outcome.result.applied.len(), 2);

    let chat = fx.repository.load(fx.chat_id).await.unwrap();
    assert_eq!(chat.status(), Some("Done"));
    assert!(chat.assignee().is_some());
    assert!(outcome.feedback.contains("✅ Status changed to Done"));
}

// =============================================================================
// Scenario: concurrent saves conflict and the loser retries
// =============================================================================

#[tokio::test]
async fn concurrent_saves_conflict_then_succeed_after_reload() {
    let fx = fixture(&[]).await;

    // Bring the log to version 3: created, converted, status moved.
    fx.pipeline
        .handle_message(fx.chat_id, "#task T", &fx.ctx)
        .await
        .unwrap();
    fx.pipeline
        .handle_message(fx.chat_id, "#status In Progress", &fx.ctx)
        .await
        .unwrap();

    // Two writers load the same version.
    let mut first = fx.repository.load(fx.chat_id).await.unwrap();
    let mut second = fx.repository.load(fx.chat_id).await.unwrap();
    assert_eq!(first.version(), 3);

    first.set_priority(Priority::High).unwrap();
    fx.repository
        .save(&mut first, EventMetadata::default())
        .await
        .unwrap();

    // The stale writer conflicts without any partial write.
    second.set_priority(Priority::High).unwrap();
    let conflict = fx
        .repository
        .save(&mut second, EventMetadata::default())
        .await;
    assert!(matches!(
        conflict,
        Err(EventStoreError::ConcurrencyConflict { expected: 3, actual: 4, .. })
    ));

    // Reload, reapply, succeed.
    let mut second = fx.repository.load(fx.chat_id).await.unwrap();
    second.set_priority(Priority::High).unwrap();
    fx.repository
        .save(&mut second, EventMetadata::default())
        .await
        .unwrap();

    // The final log carries both priority events at versions 4 and 5.
    let chat = fx.repository.load(fx.chat_id).await.unwrap();
    assert_eq!(chat.version(), 5);
    assert_eq!(chat.priority(), Some(Priority::High));
}

// =============================================================================
// Batch: creation tag activates the entity for the rest of the batch
// =============================================================================

#[tokio::test]
async fn one_message_can_create_and_configure_a_work_item() {
    let fx = fixture(&["alex"]).await;

    let outcome = fx
        .pipeline
        .handle_message(
            fx.chat_id,
            "#bug Crash on login\n#severity Critical #assignee @alex\n#due 2026-03-15",
            &fx.ctx,
        )
        .await
        .unwrap();

    assert!(outcome.result.errors.is_empty(), "{:?}", outcome.result.errors);

    let chat = fx.repository.load(fx.chat_id).await.unwrap();
    assert_eq!(chat.kind(), ChatKind::Bug);
    assert_eq!(chat.status(), Some("Open"));
    assert_eq!(
        chat.severity(),
        Some(threadwork::domain::chat::Severity::Critical)
    );
    assert_eq!(
        chat.due_date(),
        chrono::NaiveDate::from_ymd_opt(2026, 3, 15)
    );
    assert!(chat.assignee().is_some());
}

#[tokio::test]
async fn errors_and_successes_coexist_in_one_batch() {
    let fx = fixture(&[]).await;
    fx.pipeline
        .handle_message(fx.chat_id, "#task T", &fx.ctx)
        .await
        .unwrap();

    let outcome = fx
        .pipeline
        .handle_message(fx.chat_id, "#status Bogus #priority High", &fx.ctx)
        .await
        .unwrap();

    assert_eq!(outcome.result.applied.len(), 1);
    assert_eq!(outcome.result.errors.len(), 1);
    assert!(outcome.feedback.contains("✅ Priority set to High"));
    assert!(outcome.feedback.contains("❌ Invalid status 'Bogus' for Task"));

    let chat = fx.repository.load(fx.chat_id).await.unwrap();
    assert_eq!(chat.priority(), Some(Priority::High));
    assert_eq!(chat.status(), Some("To Do"));
}

// =============================================================================
// Parser round-trip property
// =============================================================================

mod parser_properties {
    use proptest::prelude::*;

    use super::tags;

    const KEYS: &[&str] = &[
        "task", "bug", "epic", "status", "assignee", "priority", "due", "title", "severity",
    ];

    /// Values that survive the grammar unchanged: no line breaks, no
    /// `#`, no leading/trailing whitespace.
    fn value_strategy() -> impl Strategy<Value = String> {
        "[A-Za-z0-9][A-Za-z0-9 @.:-]{0,18}[A-Za-z0-9]"
            .prop_map(|s| s.trim().to_string())
            .prop_filter("no inner tag boundary", |s| !s.contains('#'))
    }

    /// Plain-text lines that cannot be mistaken for tag lines.
    fn plain_line_strategy() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ,.!?]{0,30}".prop_map(|s| s.trim_end().to_string())
    }

    fn tag_strategy() -> impl Strategy<Value = (String, String)> {
        (
            proptest::sample::select(KEYS.to_vec()).prop_map(str::to_string),
            value_strategy(),
        )
    }

    proptest! {
        #[test]
        fn tag_lines_plus_plain_text_round_trip(
            tags_in in proptest::collection::vec(tag_strategy(), 0..5),
            plain_in in proptest::collection::vec(plain_line_strategy(), 0..4),
        ) {
            let tag_lines: Vec<String> = tags_in
                .iter()
                .map(|(key, value)| format!("#{} {}", key, value))
                .collect();
            let message = [tag_lines.join("\n"), plain_in.join("\n")].join("\n");

            let parsed = tags::parse(&message);

            let expected_tags: Vec<(String, String)> = tags_in.clone();
            let actual_tags: Vec<(String, String)> = parsed
                .tags
                .iter()
                .map(|t| (t.key.clone(), t.value.clone()))
                .collect();
            prop_assert_eq!(actual_tags, expected_tags);

            let expected_plain = plain_in.join("\n").trim().to_string();
            prop_assert_eq!(parsed.plain_text, expected_plain);
        }

        #[test]
        fn parsing_is_deterministic(message in "[A-Za-z0-9 #@\n.-]{0,120}") {
            let first = tags::parse(&message);
            let second = tags::parse(&message);
            prop_assert_eq!(first, second);
        }
    }
}
