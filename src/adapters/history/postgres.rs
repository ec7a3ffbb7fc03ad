//! PostgreSQL implementation of ChatHistory.
//!
//! Persists chat messages to the `chat_messages` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, RoomId, Timestamp, UserId};
use crate::domain::realtime::ChatRecord;
use crate::ports::ChatHistory;

/// PostgreSQL implementation of ChatHistory.
#[derive(Clone)]
pub struct PostgresChatHistory {
    pool: PgPool,
}

impl PostgresChatHistory {
    /// Creates a new PostgresChatHistory.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatHistory for PostgresChatHistory {
    async fn append(&self, record: &ChatRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (
                id, room_id, user_id, username, content, timestamp, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(record.room_id.as_str())
        .bind(record.user_id.as_str())
        .bind(&record.username)
        .bind(&record.content)
        .bind(record.timestamp.as_datetime())
        .bind(record.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to insert chat message: {}", e),
            )
        })?;

        Ok(())
    }

    async fn query_by_room(&self, room: &RoomId) -> Result<Vec<ChatRecord>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, room_id, user_id, username, content, timestamp, created_at
            FROM chat_messages
            WHERE room_id = $1
            ORDER BY timestamp ASC
            "#,
        )
        .bind(room.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to fetch chat history: {}", e),
            )
        })?;

        rows.into_iter().map(row_to_record).collect()
    }
}

fn row_to_record(row: PgRow) -> Result<ChatRecord, DomainError> {
    let column = |e: sqlx::Error| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to read chat message row: {}", e),
        )
    };

    let id: Uuid = row.try_get("id").map_err(column)?;
    let room_id: String = row.try_get("room_id").map_err(column)?;
    let user_id: String = row.try_get("user_id").map_err(column)?;
    let username: String = row.try_get("username").map_err(column)?;
    let content: String = row.try_get("content").map_err(column)?;
    let timestamp: DateTime<Utc> = row.try_get("timestamp").map_err(column)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(column)?;

    Ok(ChatRecord {
        id,
        room_id: RoomId::new(room_id)?,
        user_id: UserId::new(user_id)?,
        username,
        content,
        timestamp: Timestamp::from_datetime(timestamp),
        created_at: Timestamp::from_datetime(created_at),
    })
}
