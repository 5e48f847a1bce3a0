//! Task board consumer.
//!
//! Mirrors chats of kind Task onto the task board: a `chat.type_changed`
//! conversion creates the card and republishes `task.created`; later
//! status, assignee, priority, and due-date changes update the card and
//! republish the matching `task.*` event. Chats of other kinds are
//! ignored. Republished events carry the source event as causation.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::domain::chat::{ChatEvent, ChatKind};
use crate::domain::events::{
    EventPayload, TaskAssigneeChanged, TaskCreated, TaskDueDateChanged, TaskEvent,
    TaskPriorityChanged, TaskStatusChanged,
};
use crate::domain::foundation::{
    ChatId, DomainError, ErrorCode, EventEnvelope, EventId, Timestamp,
};
use crate::ports::{ChatRepository, EventHandler, EventPublisher, TaskBoard, TaskCard};

/// Handler that maintains the task board and emits `task.*` events.
pub struct TaskProjectionHandler {
    board: Arc<dyn TaskBoard>,
    repository: Arc<dyn ChatRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl TaskProjectionHandler {
    pub fn new(
        board: Arc<dyn TaskBoard>,
        repository: Arc<dyn ChatRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            board,
            repository,
            publisher,
        }
    }

    /// Event types this handler subscribes to.
    pub fn event_types() -> &'static [&'static str] {
        &[
            "chat.type_changed",
            "chat.status_changed",
            "chat.user_assigned",
            "chat.priority_set",
            "chat.due_date_set",
        ]
    }

    /// Wraps a task event in an envelope descending from the source.
    fn task_envelope(source: &EventEnvelope, task_event: TaskEvent) -> Result<EventEnvelope, DomainError> {
        let payload = task_event.to_json().map_err(|err| {
            DomainError::new(ErrorCode::SerializationFailed, err.to_string())
        })?;

        let mut metadata = source.metadata.clone();
        metadata.causation_id = Some(source.event_id.to_string());

        Ok(EventEnvelope {
            event_id: EventId::new(),
            event_type: task_event.event_type().to_string(),
            aggregate_id: source.aggregate_id.clone(),
            aggregate_type: "Task".to_string(),
            occurred_at: Timestamp::now(),
            version: source.version,
            metadata,
            payload,
        })
    }

    async fn publish(&self, source: &EventEnvelope, task_event: TaskEvent) -> Result<(), DomainError> {
        let envelope = Self::task_envelope(source, task_event)?;
        self.publisher
            .publish(envelope)
            .await
            .map_err(|err| DomainError::new(ErrorCode::BusError, err.to_string()))
    }
}

#[async_trait]
impl EventHandler for TaskProjectionHandler {
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), DomainError> {
        let chat_id: ChatId = envelope.aggregate_id.parse().map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidFormat,
                format!("malformed aggregate id '{}'", envelope.aggregate_id),
            )
        })?;

        let payload = EventPayload::decode(&envelope.event_type, &envelope.payload)
            .map_err(|err| DomainError::new(ErrorCode::UnknownEventType, err.to_string()))?;

        let EventPayload::Chat(event) = payload else {
            return Ok(());
        };

        match event {
            ChatEvent::TypeChanged(e) if e.new_type == ChatKind::Task => {
                // Rebuild from the log: the read models of other
                // handlers may not have caught up yet.
                let chat = self
                    .repository
                    .load(chat_id)
                    .await
                    .map_err(|err| DomainError::new(ErrorCode::DatabaseError, err.to_string()))?;

                let status = chat
                    .status()
                    .unwrap_or_else(|| ChatKind::Task.initial_status().unwrap_or_default())
                    .to_string();
                let now = Timestamp::now();
                let card = TaskCard {
                    chat_id,
                    workspace_id: chat.workspace_id(),
                    title: e.title.clone(),
                    status: status.clone(),
                    assignee: chat.assignee(),
                    priority: chat.priority(),
                    due_date: chat.due_date(),
                    created_at: now,
                    updated_at: now,
                };
                self.board.upsert(card).await?;
                debug!(chat_id = %chat_id, "Task card created");

                self.publish(
                    &envelope,
                    TaskEvent::Created(TaskCreated {
                        chat_id,
                        workspace_id: chat.workspace_id(),
                        title: e.title,
                        status,
                    }),
                )
                .await?;
            }
            ChatEvent::StatusChanged(e) => {
                if let Some(mut card) = self.board.find(chat_id).await? {
                    card.status = e.new_status.clone();
                    card.updated_at = Timestamp::now();
                    self.board.upsert(card).await?;

                    self.publish(
                        &envelope,
                        TaskEvent::StatusChanged(TaskStatusChanged {
                            chat_id,
                            old_status: e.old_status,
                            new_status: e.new_status,
                        }),
                    )
                    .await?;
                }
            }
            ChatEvent::UserAssigned(e) => {
                if let Some(mut card) = self.board.find(chat_id).await? {
                    card.assignee = e.assignee;
                    card.updated_at = Timestamp::now();
                    self.board.upsert(card).await?;

                    self.publish(
                        &envelope,
                        TaskEvent::AssigneeChanged(TaskAssigneeChanged {
                            chat_id,
                            assignee: e.assignee,
                        }),
                    )
                    .await?;
                }
            }
            ChatEvent::PrioritySet(e) => {
                if let Some(mut card) = self.board.find(chat_id).await? {
                    card.priority = Some(e.priority);
                    card.updated_at = Timestamp::now();
                    self.board.upsert(card).await?;

                    self.publish(
                        &envelope,
                        TaskEvent::PriorityChanged(TaskPriorityChanged {
                            chat_id,
                            priority: e.priority,
                        }),
                    )
                    .await?;
                }
            }
            ChatEvent::DueDateSet(e) => {
                if let Some(mut card) = self.board.find(chat_id).await? {
                    card.due_date = e.due_date;
                    card.updated_at = Timestamp::now();
                    self.board.upsert(card).await?;

                    self.publish(
                        &envelope,
                        TaskEvent::DueDateChanged(TaskDueDateChanged {
                            chat_id,
                            due_date: e.due_date,
                        }),
                    )
                    .await?;
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "TaskProjectionHandler"
    }
}
