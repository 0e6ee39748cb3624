use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use super::{ensure_project_access, ServiceError};
use crate::database::models::{AssistantKind, Chat, ChatDetail, ChatSummary, Message};
use crate::database::repositories::{ChatRepository, MessageRepository, ProjectRepository};
use crate::middleware::AuthUser;
use crate::validators::{self, ValidationError};

pub const DEFAULT_ASSISTANT: &str = "apbia";
pub const DEFAULT_MESSAGE_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub project_id: i64,
    #[serde(default)]
    pub assistant: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

pub struct ChatService {
    chats: ChatRepository,
    messages: MessageRepository,
    projects: ProjectRepository,
}

impl ChatService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            chats: ChatRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            projects: ProjectRepository::new(pool),
        }
    }

    pub async fn assistant_kinds(&self) -> Result<Vec<AssistantKind>, ServiceError> {
        Ok(self.chats.assistant_kinds().await?)
    }

    pub async fn create(&self, user: &AuthUser, request: CreateChatRequest) -> Result<Chat, ServiceError> {
        let project = self
            .projects
            .find_by_id(request.project_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Project {} not found", request.project_id)))?;
        ensure_project_access(&self.projects, user, project.id).await?;

        let assistant_name = request.assistant.as_deref().unwrap_or(DEFAULT_ASSISTANT);
        let assistant = self
            .chats
            .find_assistant_kind(assistant_name)
            .await?
            .ok_or_else(|| ValidationError::new("assistant", format!("Unknown assistant: {}", assistant_name)))?;

        let title = match request.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => format!("Chat - {}", project.name),
        };

        let chat = self.chats.create(project.id, assistant.id, &title).await?;
        info!(chat_id = chat.id, project_id = project.id, user_id = user.user_id, "Chat created");
        Ok(chat)
    }

    /// Loads a chat the user may see.
    pub async fn find_accessible(&self, user: &AuthUser, id: i64) -> Result<Chat, ServiceError> {
        let chat = self
            .chats
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Chat {} not found", id)))?;
        ensure_project_access(&self.projects, user, chat.project_id).await?;
        Ok(chat)
    }

    pub async fn detail(&self, user: &AuthUser, id: i64, include_messages: bool) -> Result<ChatDetail, ServiceError> {
        let chat = self.find_accessible(user, id).await?;
        let message_count = self.messages.count_in_chat(id).await?;
        let messages = if include_messages {
            Some(self.messages.list_by_chat(id, DEFAULT_MESSAGE_LIMIT).await?)
        } else {
            None
        };

        Ok(ChatDetail {
            chat,
            message_count,
            messages,
        })
    }

    pub async fn list_for_project(&self, user: &AuthUser, project_id: i64) -> Result<Vec<ChatSummary>, ServiceError> {
        if self.projects.find_by_id(project_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!("Project {} not found", project_id)));
        }
        ensure_project_access(&self.projects, user, project_id).await?;
        Ok(self.chats.list_by_project(project_id).await?)
    }

    pub async fn rename(&self, user: &AuthUser, id: i64, title: &str) -> Result<Chat, ServiceError> {
        let title = validators::require_text("title", title)?;
        self.find_accessible(user, id).await?;
        Ok(self.chats.update_title(id, &title).await?)
    }

    pub async fn delete(&self, user: &AuthUser, id: i64) -> Result<(), ServiceError> {
        self.find_accessible(user, id).await?;
        self.chats.delete(id).await?;
        info!(chat_id = id, user_id = user.user_id, "Chat deleted");
        Ok(())
    }

    pub async fn messages(&self, user: &AuthUser, id: i64, limit: Option<i64>) -> Result<Vec<Message>, ServiceError> {
        self.find_accessible(user, id).await?;
        let limit = limit.unwrap_or(DEFAULT_MESSAGE_LIMIT).clamp(1, 1000);
        Ok(self.messages.list_by_chat(id, limit).await?)
    }

    pub async fn advisor_notes(&self, user: &AuthUser, id: i64) -> Result<Vec<Message>, ServiceError> {
        self.find_accessible(user, id).await?;
        Ok(self.messages.advisor_notes(id).await?)
    }
}
