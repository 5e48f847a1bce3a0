//! PostgreSQL adapter for the chat read model.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::chat::{ChatKind, Priority, Severity};
use crate::domain::foundation::{
    ChatId, DomainError, ErrorCode, Timestamp, UserId, WorkspaceId,
};
use crate::ports::{ChatReadModel, ChatRecord};

fn database(err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, err.to_string())
}

fn kind_to_str(kind: ChatKind) -> &'static str {
    match kind {
        ChatKind::Discussion => "discussion",
        ChatKind::Task => "task",
        ChatKind::Bug => "bug",
        ChatKind::Epic => "epic",
    }
}

fn kind_from_str(s: &str) -> Result<ChatKind, DomainError> {
    match s {
        "discussion" => Ok(ChatKind::Discussion),
        "task" => Ok(ChatKind::Task),
        "bug" => Ok(ChatKind::Bug),
        "epic" => Ok(ChatKind::Epic),
        other => Err(DomainError::new(
            ErrorCode::InvalidFormat,
            format!("unknown chat kind '{}'", other),
        )),
    }
}

type ChatRow = (
    Uuid,
    Uuid,
    String,
    String,
    Option<String>,
    Option<Uuid>,
    Option<String>,
    Option<NaiveDate>,
    Option<String>,
    bool,
    bool,
    DateTime<Utc>,
);

fn row_to_record(row: ChatRow) -> Result<ChatRecord, DomainError> {
    let (id, workspace_id, kind, title, status, assignee, priority, due_date, severity, closed, hidden, updated_at) =
        row;

    let priority = priority
        .as_deref()
        .map(|p| {
            Priority::parse(p).ok_or_else(|| {
                DomainError::new(ErrorCode::InvalidFormat, format!("unknown priority '{}'", p))
            })
        })
        .transpose()?;
    let severity = severity
        .as_deref()
        .map(|s| {
            Severity::parse(s).ok_or_else(|| {
                DomainError::new(ErrorCode::InvalidFormat, format!("unknown severity '{}'", s))
            })
        })
        .transpose()?;

    Ok(ChatRecord {
        chat_id: ChatId::from_uuid(id),
        workspace_id: WorkspaceId::from_uuid(workspace_id),
        kind: kind_from_str(&kind)?,
        title,
        status,
        assignee: assignee.map(UserId::from_uuid),
        priority,
        due_date,
        severity,
        closed,
        hidden,
        updated_at: Timestamp::from_datetime(updated_at),
    })
}

/// PostgreSQL-backed chat read model.
#[derive(Clone)]
pub struct PostgresChatReadModel {
    pool: PgPool,
}

impl PostgresChatReadModel {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatReadModel for PostgresChatReadModel {
    async fn upsert(&self, record: ChatRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO chats (
                id, workspace_id, kind, title, status, assignee,
                priority, due_date, severity, closed, hidden, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                kind = $3, title = $4, status = $5, assignee = $6,
                priority = $7, due_date = $8, severity = $9,
                closed = $10, hidden = $11, updated_at = $12
            "#,
        )
        .bind(record.chat_id.as_uuid())
        .bind(record.workspace_id.as_uuid())
        .bind(kind_to_str(record.kind))
        .bind(&record.title)
        .bind(&record.status)
        .bind(record.assignee.map(|u| *u.as_uuid()))
        .bind(record.priority.map(|p| p.to_string()))
        .bind(record.due_date)
        .bind(record.severity.map(|s| s.to_string()))
        .bind(record.closed)
        .bind(record.hidden)
        .bind(record.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(database)?;

        Ok(())
    }

    async fn find(&self, chat_id: ChatId) -> Result<Option<ChatRecord>, DomainError> {
        let row: Option<ChatRow> = sqlx::query_as(
            r#"
            SELECT id, workspace_id, kind, title, status, assignee,
                   priority, due_date, severity, closed, hidden, updated_at
            FROM chats
            WHERE id = $1
            "#,
        )
        .bind(chat_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(database)?;

        row.map(row_to_record).transpose()
    }

    async fn hide(&self, chat_id: ChatId) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE chats SET hidden = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(chat_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(database)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::ChatNotFound,
                format!("chat {} not in read model", chat_id),
            ));
        }
        Ok(())
    }

    async fn list_visible(
        &self,
        workspace_id: WorkspaceId,
    ) -> Result<Vec<ChatRecord>, DomainError> {
        let rows: Vec<ChatRow> = sqlx::query_as(
            r#"
            SELECT id, workspace_id, kind, title, status, assignee,
                   priority, due_date, severity, closed, hidden, updated_at
            FROM chats
            WHERE workspace_id = $1 AND hidden = FALSE
            ORDER BY updated_at DESC
            "#,
        )
        .bind(workspace_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(database)?;

        rows.into_iter().map(row_to_record).collect()
    }
}
