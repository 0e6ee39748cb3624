use sqlx::PgPool;

use crate::database::models::{Message, NewMessage};
use crate::database::DatabaseError;

const MESSAGE_SELECT: &str = "SELECT m.id, m.chat_id, m.user_id, u.name AS author_name, \
     m.content, m.is_advisor_note, m.created_at \
     FROM messages m LEFT JOIN users u ON u.id = m.user_id";

#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, message: NewMessage) -> Result<Message, DatabaseError> {
        let (id,) = sqlx::query_as::<_, (i64,)>(
            "INSERT INTO messages (chat_id, user_id, content, is_advisor_note) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(message.chat_id)
        .bind(message.user_id)
        .bind(&message.content)
        .bind(message.is_advisor_note)
        .fetch_one(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("message {}", id)))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Message>, DatabaseError> {
        let sql = format!("{} WHERE m.id = $1", MESSAGE_SELECT);
        Ok(sqlx::query_as::<_, Message>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Oldest first, capped at `limit`.
    pub async fn list_by_chat(&self, chat_id: i64, limit: i64) -> Result<Vec<Message>, DatabaseError> {
        let sql = format!(
            "{} WHERE m.chat_id = $1 ORDER BY m.created_at, m.id LIMIT $2",
            MESSAGE_SELECT
        );
        Ok(sqlx::query_as::<_, Message>(&sql)
            .bind(chat_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    /// The latest `limit` conversation turns before `exclude_id`, oldest first.
    /// Advisor notes are not part of the conversation.
    pub async fn recent_history(&self, chat_id: i64, exclude_id: i64, limit: i64) -> Result<Vec<Message>, DatabaseError> {
        let sql = format!(
            "SELECT * FROM ({} WHERE m.chat_id = $1 AND m.id <> $2 AND NOT m.is_advisor_note \
             ORDER BY m.created_at DESC, m.id DESC LIMIT $3) recent \
             ORDER BY created_at, id",
            MESSAGE_SELECT
        );
        Ok(sqlx::query_as::<_, Message>(&sql)
            .bind(chat_id)
            .bind(exclude_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn advisor_notes(&self, chat_id: i64) -> Result<Vec<Message>, DatabaseError> {
        let sql = format!(
            "{} WHERE m.chat_id = $1 AND m.is_advisor_note ORDER BY m.created_at, m.id",
            MESSAGE_SELECT
        );
        Ok(sqlx::query_as::<_, Message>(&sql)
            .bind(chat_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn count_in_chat(&self, chat_id: i64) -> Result<i64, DatabaseError> {
        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM messages WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
