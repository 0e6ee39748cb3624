use sqlx::PgPool;

use crate::database::models::{AssistantKind, Chat, ChatSummary};
use crate::database::DatabaseError;

const CHAT_SELECT: &str = "SELECT c.id, c.project_id, p.name AS project_name, k.name AS assistant, \
     c.title, c.created_at \
     FROM chats c \
     JOIN projects p ON p.id = c.project_id \
     JOIN assistant_kinds k ON k.id = c.assistant_kind_id";

#[derive(Clone)]
pub struct ChatRepository {
    pool: PgPool,
}

impl ChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn assistant_kinds(&self) -> Result<Vec<AssistantKind>, DatabaseError> {
        Ok(sqlx::query_as::<_, AssistantKind>(
            "SELECT id, name, description FROM assistant_kinds ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn find_assistant_kind(&self, name: &str) -> Result<Option<AssistantKind>, DatabaseError> {
        Ok(sqlx::query_as::<_, AssistantKind>(
            "SELECT id, name, description FROM assistant_kinds WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn create(&self, project_id: i64, assistant_kind_id: i32, title: &str) -> Result<Chat, DatabaseError> {
        let (id,) = sqlx::query_as::<_, (i64,)>(
            "INSERT INTO chats (project_id, assistant_kind_id, title) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(project_id)
        .bind(assistant_kind_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("chat {}", id)))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Chat>, DatabaseError> {
        let sql = format!("{} WHERE c.id = $1", CHAT_SELECT);
        Ok(sqlx::query_as::<_, Chat>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Chats of a project, newest first, with their message counts.
    pub async fn list_by_project(&self, project_id: i64) -> Result<Vec<ChatSummary>, DatabaseError> {
        let sql = "SELECT c.id, c.project_id, p.name AS project_name, k.name AS assistant, \
                   c.title, c.created_at, \
                   (SELECT COUNT(*) FROM messages m WHERE m.chat_id = c.id) AS message_count \
                   FROM chats c \
                   JOIN projects p ON p.id = c.project_id \
                   JOIN assistant_kinds k ON k.id = c.assistant_kind_id \
                   WHERE c.project_id = $1 \
                   ORDER BY c.created_at DESC";
        Ok(sqlx::query_as::<_, ChatSummary>(sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn update_title(&self, id: i64, title: &str) -> Result<Chat, DatabaseError> {
        let result = sqlx::query("UPDATE chats SET title = $2 WHERE id = $1")
            .bind(id)
            .bind(title)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("chat {}", id)));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("chat {}", id)))
    }

    /// Deletes the chat; messages go with it.
    pub async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM chats WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("chat {}", id)));
        }
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM chats")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
