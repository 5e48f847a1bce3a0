//! Chat aggregate - the consistency boundary of the system.
//!
//! A chat's state is derived by folding its event log. Command methods
//! validate against the current state, then record an event; recording
//! applies the event through the same reducer used during replay, so a
//! freshly mutated aggregate and a reloaded one are always reached by
//! identical code paths.
//!
//! # Invariants
//!
//! - Kind transitions are allowed only from Discussion to Task/Bug/Epic
//! - `status` is always a member of the current kind's workflow
//! - `severity` is only ever set while the kind is Bug
//! - `version()` equals the persisted version plus the uncommitted count

use chrono::NaiveDate;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::foundation::{ChatId, UserId, WorkspaceId};

use super::errors::{ChatError, MAX_TITLE_LENGTH};
use super::events::{
    ChatClosed, ChatCreated, ChatDeleted, ChatEvent, ChatReopened, DueDateSet, ParticipantAdded,
    ParticipantRemoved, PrioritySet, Renamed, SeveritySet, StatusChanged, TypeChanged,
    UserAssigned,
};
use super::values::{ChatKind, ParticipantRole, Priority, Severity};

/// Chat aggregate root.
#[derive(Debug, Clone)]
pub struct Chat {
    id: ChatId,
    workspace_id: WorkspaceId,
    kind: ChatKind,
    title: String,
    status: Option<String>,
    assignee: Option<UserId>,
    priority: Option<Priority>,
    due_date: Option<NaiveDate>,
    severity: Option<Severity>,
    participants: HashMap<UserId, ParticipantRole>,
    closed: bool,
    deleted: bool,
    persisted_version: i64,
    uncommitted: Vec<ChatEvent>,
}

impl Chat {
    /// Opens a new chat as a Discussion. The creator becomes the owner.
    pub fn create(
        id: ChatId,
        workspace_id: WorkspaceId,
        title: String,
        created_by: UserId,
    ) -> Result<Self, ChatError> {
        validate_title(&title)?;

        let mut chat = Self::blank(id);
        chat.record(ChatEvent::Created(ChatCreated {
            workspace_id,
            title,
            created_by,
        }));
        Ok(chat)
    }

    /// Rebuilds a chat by folding its event log.
    ///
    /// `version` is the version of the last event in the log. Replay is
    /// infallible: every event in the log was validated when it was
    /// recorded.
    pub fn replay(id: ChatId, events: impl IntoIterator<Item = ChatEvent>, version: i64) -> Self {
        let mut chat = Self::blank(id);
        for event in events {
            chat.apply(&event);
        }
        chat.persisted_version = version;
        chat
    }

    fn blank(id: ChatId) -> Self {
        Self {
            id,
            workspace_id: WorkspaceId::from_uuid(Uuid::nil()),
            kind: ChatKind::Discussion,
            title: String::new(),
            status: None,
            assignee: None,
            priority: None,
            due_date: None,
            severity: None,
            participants: HashMap::new(),
            closed: false,
            deleted: false,
            persisted_version: 0,
            uncommitted: Vec::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> ChatId {
        self.id
    }

    pub fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }

    pub fn kind(&self) -> ChatKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn assignee(&self) -> Option<UserId> {
        self.assignee
    }

    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn severity(&self) -> Option<Severity> {
        self.severity
    }

    pub fn participants(&self) -> &HashMap<UserId, ParticipantRole> {
        &self.participants
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Version of the log this aggregate was loaded at.
    pub fn persisted_version(&self) -> i64 {
        self.persisted_version
    }

    /// Current version: persisted version plus uncommitted events.
    pub fn version(&self) -> i64 {
        self.persisted_version + self.uncommitted.len() as i64
    }

    /// Events recorded since the aggregate was loaded.
    pub fn uncommitted_events(&self) -> &[ChatEvent] {
        &self.uncommitted
    }

    /// Marks the uncommitted buffer as persisted at the given version.
    ///
    /// Called by the repository after a successful append.
    pub fn mark_committed(&mut self, version: i64) {
        self.persisted_version = version;
        self.uncommitted.clear();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────

    /// Converts this Discussion into a work item.
    pub fn convert_to(&mut self, kind: ChatKind, title: String) -> Result<(), ChatError> {
        self.ensure_not_deleted()?;
        if self.kind != ChatKind::Discussion || !kind.is_work_item() {
            return Err(ChatError::AlreadyConverted { current: self.kind });
        }
        validate_title(&title)?;

        self.record(ChatEvent::TypeChanged(TypeChanged {
            new_type: kind,
            title,
        }));
        Ok(())
    }

    /// Moves the work item to a new status within its kind's workflow.
    pub fn change_status(&mut self, status: &str) -> Result<(), ChatError> {
        self.ensure_not_deleted()?;
        if !self.kind.is_work_item() {
            return Err(ChatError::StatusNotSupported { kind: self.kind });
        }
        if !self.kind.is_valid_status(status) {
            return Err(ChatError::UnknownStatus {
                status: status.to_string(),
                kind: self.kind,
            });
        }

        self.record(ChatEvent::StatusChanged(StatusChanged {
            old_status: self.status.clone(),
            new_status: status.to_string(),
        }));
        Ok(())
    }

    /// Assigns the work item, or unassigns it when `assignee` is `None`.
    pub fn assign(&mut self, assignee: Option<UserId>) -> Result<(), ChatError> {
        self.ensure_not_deleted()?;
        if !self.kind.is_work_item() {
            return Err(ChatError::StatusNotSupported { kind: self.kind });
        }

        self.record(ChatEvent::UserAssigned(UserAssigned { assignee }));
        Ok(())
    }

    /// Sets the work-item priority.
    pub fn set_priority(&mut self, priority: Priority) -> Result<(), ChatError> {
        self.ensure_not_deleted()?;
        if !self.kind.is_work_item() {
            return Err(ChatError::StatusNotSupported { kind: self.kind });
        }

        self.record(ChatEvent::PrioritySet(PrioritySet { priority }));
        Ok(())
    }

    /// Sets the due date, or clears it when `due_date` is `None`.
    pub fn set_due_date(&mut self, due_date: Option<NaiveDate>) -> Result<(), ChatError> {
        self.ensure_not_deleted()?;
        if !self.kind.is_work_item() {
            return Err(ChatError::StatusNotSupported { kind: self.kind });
        }

        self.record(ChatEvent::DueDateSet(DueDateSet { due_date }));
        Ok(())
    }

    /// Renames the chat.
    pub fn rename(&mut self, new_title: String) -> Result<(), ChatError> {
        self.ensure_not_deleted()?;
        validate_title(&new_title)?;

        self.record(ChatEvent::Renamed(Renamed {
            old_title: self.title.clone(),
            new_title,
        }));
        Ok(())
    }

    /// Sets the bug severity. Rejected with warning severity on any other
    /// kind.
    pub fn set_severity(&mut self, severity: Severity) -> Result<(), ChatError> {
        self.ensure_not_deleted()?;
        if self.kind != ChatKind::Bug {
            return Err(ChatError::SeverityRequiresBug { kind: self.kind });
        }

        self.record(ChatEvent::SeveritySet(SeveritySet { severity }));
        Ok(())
    }

    /// Adds a participant.
    pub fn invite(&mut self, user_id: UserId, role: ParticipantRole) -> Result<(), ChatError> {
        self.ensure_not_deleted()?;
        if self.participants.contains_key(&user_id) {
            return Err(ChatError::AlreadyParticipant { user_id });
        }

        self.record(ChatEvent::ParticipantAdded(ParticipantAdded {
            user_id,
            role,
        }));
        Ok(())
    }

    /// Removes a participant.
    pub fn remove(&mut self, user_id: UserId) -> Result<(), ChatError> {
        self.ensure_not_deleted()?;
        if !self.participants.contains_key(&user_id) {
            return Err(ChatError::NotParticipant { user_id });
        }

        self.record(ChatEvent::ParticipantRemoved(ParticipantRemoved {
            user_id,
        }));
        Ok(())
    }

    /// Closes the chat.
    pub fn close(&mut self) -> Result<(), ChatError> {
        self.ensure_not_deleted()?;
        if self.closed {
            return Err(ChatError::AlreadyClosed);
        }

        self.record(ChatEvent::Closed(ChatClosed {}));
        Ok(())
    }

    /// Reopens a closed chat.
    pub fn reopen(&mut self) -> Result<(), ChatError> {
        self.ensure_not_deleted()?;
        if !self.closed {
            return Err(ChatError::NotClosed);
        }

        self.record(ChatEvent::Reopened(ChatReopened {}));
        Ok(())
    }

    /// Soft-deletes the chat. Projections hide it; the log remains.
    pub fn delete(&mut self) -> Result<(), ChatError> {
        self.ensure_not_deleted()?;

        self.record(ChatEvent::Deleted(ChatDeleted {}));
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reducer
    // ─────────────────────────────────────────────────────────────────────

    fn record(&mut self, event: ChatEvent) {
        self.apply(&event);
        self.uncommitted.push(event);
    }

    fn apply(&mut self, event: &ChatEvent) {
        match event {
            ChatEvent::Created(e) => {
                self.workspace_id = e.workspace_id;
                self.title = e.title.clone();
                self.participants.insert(e.created_by, ParticipantRole::Owner);
            }
            ChatEvent::ParticipantAdded(e) => {
                self.participants.insert(e.user_id, e.role);
            }
            ChatEvent::ParticipantRemoved(e) => {
                self.participants.remove(&e.user_id);
            }
            ChatEvent::TypeChanged(e) => {
                self.kind = e.new_type;
                self.title = e.title.clone();
                self.status = e.new_type.initial_status().map(str::to_string);
            }
            ChatEvent::StatusChanged(e) => {
                self.status = Some(e.new_status.clone());
            }
            ChatEvent::UserAssigned(e) => {
                self.assignee = e.assignee;
            }
            ChatEvent::Renamed(e) => {
                self.title = e.new_title.clone();
            }
            ChatEvent::PrioritySet(e) => {
                self.priority = Some(e.priority);
            }
            ChatEvent::DueDateSet(e) => {
                self.due_date = e.due_date;
            }
            ChatEvent::SeveritySet(e) => {
                self.severity = Some(e.severity);
            }
            ChatEvent::Closed(_) => {
                self.closed = true;
            }
            ChatEvent::Reopened(_) => {
                self.closed = false;
            }
            ChatEvent::Deleted(_) => {
                self.deleted = true;
            }
        }
    }

    fn ensure_not_deleted(&self) -> Result<(), ChatError> {
        if self.deleted {
            Err(ChatError::Deleted)
        } else {
            Ok(())
        }
    }
}

fn validate_title(title: &str) -> Result<(), ChatError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ChatError::EmptyTitle);
    }
    if trimmed.len() > MAX_TITLE_LENGTH {
        return Err(ChatError::TitleTooLong);
    }
    Ok(())
}
