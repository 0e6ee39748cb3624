use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    /// `None` for assistant replies
    pub user_id: Option<i64>,
    pub author_name: Option<String>,
    pub content: String,
    pub is_advisor_note: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_from_assistant(&self) -> bool {
        self.user_id.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chat_id: i64,
    pub user_id: Option<i64>,
    pub content: String,
    pub is_advisor_note: bool,
}

impl NewMessage {
    pub fn from_user(chat_id: i64, user_id: i64, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            user_id: Some(user_id),
            content: content.into(),
            is_advisor_note: false,
        }
    }

    pub fn from_assistant(chat_id: i64, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            user_id: None,
            content: content.into(),
            is_advisor_note: false,
        }
    }

    pub fn advisor_note(chat_id: i64, user_id: i64, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            user_id: Some(user_id),
            content: content.into(),
            is_advisor_note: true,
        }
    }
}
