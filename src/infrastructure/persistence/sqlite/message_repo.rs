//! SQLite Message Repository

use async_trait::async_trait;
use sqlx::FromRow;
use uuid::Uuid;

use super::database::{db_error, parse_time, parse_uuid};
use super::DbPool;
use crate::application::ports::{MessageRecord, MessageRepositoryPort, MessageRole, RepositoryError};

/// SQLite Message Repository
pub struct SqliteMessageRepository {
    pool: DbPool,
}

impl SqliteMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct MessageRow {
    id: String,
    scenario_id: String,
    position: i64,
    role: String,
    content: String,
    created_at: String,
}

impl TryFrom<MessageRow> for MessageRecord {
    type Error = RepositoryError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let role = MessageRole::from_str(&row.role).ok_or_else(|| {
            RepositoryError::SerializationError(format!("unknown message role: {}", row.role))
        })?;

        Ok(MessageRecord {
            id: parse_uuid(&row.id)?,
            scenario_id: parse_uuid(&row.scenario_id)?,
            order: row.position,
            role,
            content: row.content,
            created_at: parse_time(&row.created_at)?,
        })
    }
}

#[async_trait]
impl MessageRepositoryPort for SqliteMessageRepository {
    async fn save(&self, message: &MessageRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, scenario_id, position, role, content, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                content = excluded.content
            "#,
        )
        .bind(message.id.to_string())
        .bind(message.scenario_id.to_string())
        .bind(message.order)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_by_scenario(&self, scenario_id: Uuid) -> Result<Vec<MessageRecord>, RepositoryError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, scenario_id, position, role, content, created_at FROM messages WHERE scenario_id = ? ORDER BY position",
        )
        .bind(scenario_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(MessageRecord::try_from).collect()
    }

    async fn next_order(&self, scenario_id: Uuid) -> Result<i64, RepositoryError> {
        sqlx::query_scalar("SELECT COALESCE(MAX(position) + 1, 0) FROM messages WHERE scenario_id = ?")
            .bind(scenario_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)
    }
}
