use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::Message;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AssistantKind {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
}

/// A chat joined with its project and assistant names.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Chat {
    pub id: i64,
    pub project_id: i64,
    pub project_name: String,
    pub assistant: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChatSummary {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub chat: Chat,
    pub message_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatDetail {
    #[serde(flatten)]
    pub chat: Chat,
    pub message_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
}
