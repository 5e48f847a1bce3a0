//! PostgreSQL adapter for the task board projection.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::chat::Priority;
use crate::domain::foundation::{
    ChatId, DomainError, ErrorCode, Timestamp, UserId, WorkspaceId,
};
use crate::ports::{TaskBoard, TaskCard};

fn database(err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, err.to_string())
}

type TaskRow = (
    Uuid,
    Uuid,
    String,
    String,
    Option<Uuid>,
    Option<String>,
    Option<NaiveDate>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn row_to_card(row: TaskRow) -> Result<TaskCard, DomainError> {
    let (chat_id, workspace_id, title, status, assignee, priority, due_date, created_at, updated_at) =
        row;

    let priority = priority
        .as_deref()
        .map(|p| {
            Priority::parse(p).ok_or_else(|| {
                DomainError::new(ErrorCode::InvalidFormat, format!("unknown priority '{}'", p))
            })
        })
        .transpose()?;

    Ok(TaskCard {
        chat_id: ChatId::from_uuid(chat_id),
        workspace_id: WorkspaceId::from_uuid(workspace_id),
        title,
        status,
        assignee: assignee.map(UserId::from_uuid),
        priority,
        due_date,
        created_at: Timestamp::from_datetime(created_at),
        updated_at: Timestamp::from_datetime(updated_at),
    })
}

/// PostgreSQL-backed task board.
#[derive(Clone)]
pub struct PostgresTaskBoard {
    pool: PgPool,
}

impl PostgresTaskBoard {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskBoard for PostgresTaskBoard {
    async fn upsert(&self, card: TaskCard) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO task_board (
                chat_id, workspace_id, title, status, assignee,
                priority, due_date, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (chat_id) DO UPDATE SET
                title = $3, status = $4, assignee = $5,
                priority = $6, due_date = $7, updated_at = $9
            "#,
        )
        .bind(card.chat_id.as_uuid())
        .bind(card.workspace_id.as_uuid())
        .bind(&card.title)
        .bind(&card.status)
        .bind(card.assignee.map(|u| *u.as_uuid()))
        .bind(card.priority.map(|p| p.to_string()))
        .bind(card.due_date)
        .bind(card.created_at.as_datetime())
        .bind(card.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(database)?;

        Ok(())
    }

    async fn find(&self, chat_id: ChatId) -> Result<Option<TaskCard>, DomainError> {
        let row: Option<TaskRow> = sqlx::query_as(
            r#"
            SELECT chat_id, workspace_id, title, status, assignee,
                   priority, due_date, created_at, updated_at
            FROM task_board
            WHERE chat_id = $1
            "#,
        )
        .bind(chat_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(database)?;

        row.map(row_to_card).transpose()
    }
}
