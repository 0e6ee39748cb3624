use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};

use super::{ChatService, ServiceError};
use crate::ai::prompt::history_turn;
use crate::ai::{estimate_tokens, GenerationMode, GenerationRequest, GenerativeAi};
use crate::context::{CacheSummary, ContextCache};
use crate::database::models::{Message, NewMessage};
use crate::database::repositories::MessageRepository;
use crate::governor::{UsageGovernor, UsageReport};
use crate::middleware::AuthUser;
use crate::storage::ObjectInfo;
use crate::validators::{self, ValidationError};

/// Conversation turns sent along with a standard question.
pub const HISTORY_LIMIT: i64 = 20;
pub const REGENERATED_PREFIX: &str = "[REGENERATED ANSWER]";
pub const ADVISOR_NOTE_PREFIX: &str = "📝 ADVISOR NOTE:";

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub chat_id: i64,
    pub content: String,
    #[serde(default)]
    pub mode: GenerationMode,
    /// Ground the answer on one fair edition instead of every context file.
    #[serde(default)]
    pub edition_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateRequest {
    pub message_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct AdvisorNoteRequest {
    pub message_id: i64,
    pub note: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationTurn {
    pub user_message: Message,
    pub assistant_message: Message,
    pub usage: UsageReport,
}

#[derive(Debug, Default, Serialize)]
pub struct ContextCheck {
    pub bucket: String,
    pub connected: bool,
    pub object_count: Option<usize>,
    pub connection_error: Option<String>,
    pub loaded_files: usize,
    pub load_error: Option<String>,
    pub cache: Option<CacheSummary>,
    pub available: Vec<ObjectInfo>,
}

/// Questions to the assistant, gated by the usage governor.
pub struct AssistantService {
    chats: ChatService,
    messages: MessageRepository,
    governor: Arc<UsageGovernor>,
    contexts: Arc<ContextCache>,
    ai: Arc<dyn GenerativeAi>,
}

impl AssistantService {
    pub fn new(
        pool: PgPool,
        governor: Arc<UsageGovernor>,
        contexts: Arc<ContextCache>,
        ai: Arc<dyn GenerativeAi>,
    ) -> Self {
        Self {
            chats: ChatService::new(pool.clone()),
            messages: MessageRepository::new(pool),
            governor,
            contexts,
            ai,
        }
    }

    /// Missing contexts degrade the answer but never fail the request.
    async fn contexts_or_empty(&self, edition_year: Option<i32>) -> Vec<String> {
        let loaded = match edition_year {
            Some(year) => self.contexts.load_year(year).await,
            None => self.contexts.load_all().await,
        };
        match loaded {
            Ok(contexts) => contexts,
            Err(e) => {
                warn!(error = %e, "Continuing without contexts");
                Vec::new()
            }
        }
    }

    pub async fn send_message(&self, user: &AuthUser, request: SendMessageRequest) -> Result<ConversationTurn, ServiceError> {
        let question = validators::require_text("content", &request.content)?;
        if let Some(year) = request.edition_year {
            validators::validate_edition_year(year, Utc::now().year())?;
        }

        // Refusals before the access check, the throttling wait after it.
        let delay = self.governor.admit().await?;
        let chat = self.chats.find_accessible(user, request.chat_id).await?;
        self.governor.throttle(delay).await;

        let user_message = self
            .messages
            .create(NewMessage::from_user(chat.id, user.user_id, question.clone()))
            .await?;

        let contexts = self.contexts_or_empty(request.edition_year).await;
        let history = match request.mode {
            GenerationMode::Standard => self
                .messages
                .recent_history(chat.id, user_message.id, HISTORY_LIMIT)
                .await?
                .iter()
                .map(|m| history_turn(m.user_id, &m.content))
                .collect(),
            GenerationMode::Thinking => Vec::new(),
        };

        let generation = self
            .ai
            .generate(GenerationRequest {
                question: question.clone(),
                contexts,
                history,
                mode: request.mode,
            })
            .await?;

        let assistant_message = self
            .messages
            .create(NewMessage::from_assistant(chat.id, generation.text.clone()))
            .await?;

        let tokens = generation
            .total_tokens
            .unwrap_or_else(|| estimate_tokens(&format!("{}{}", question, generation.text)));
        self.governor.record_request(tokens).await;

        info!(
            chat_id = chat.id,
            user_id = user.user_id,
            mode = ?request.mode,
            tokens,
            "Assistant answered"
        );

        Ok(ConversationTurn {
            user_message,
            assistant_message,
            usage: self.governor.report().await,
        })
    }

    /// A fresh answer to an earlier student message, without chat history.
    pub async fn regenerate(&self, user: &AuthUser, request: RegenerateRequest) -> Result<Message, ServiceError> {
        let delay = self.governor.admit().await?;

        let original = self.find_message(request.message_id).await?;
        if original.is_from_assistant() || original.is_advisor_note {
            return Err(ValidationError::new("message_id", "Only student messages can be answered again").into());
        }
        self.chats.find_accessible(user, original.chat_id).await?;
        self.governor.throttle(delay).await;

        let contexts = self.contexts_or_empty(None).await;
        let generation = self
            .ai
            .generate(GenerationRequest {
                question: original.content.clone(),
                contexts,
                ..GenerationRequest::default()
            })
            .await?;

        let content = format!("{}\n\n{}", REGENERATED_PREFIX, generation.text);
        let message = self
            .messages
            .create(NewMessage::from_assistant(original.chat_id, content))
            .await?;

        let tokens = generation
            .total_tokens
            .unwrap_or_else(|| estimate_tokens(&generation.text));
        self.governor.record_request(tokens).await;

        info!(chat_id = original.chat_id, message_id = original.id, tokens, "Answer regenerated");
        Ok(message)
    }

    /// Advisors annotate an assistant answer; the note joins the same chat.
    pub async fn add_note(&self, user: &AuthUser, request: AdvisorNoteRequest) -> Result<Message, ServiceError> {
        if !user.role.can_annotate() {
            return Err(ServiceError::Forbidden("Only advisors can add notes".to_string()));
        }
        let note = validators::require_text("note", &request.note)?;

        let answer = self.find_message(request.message_id).await?;
        if !answer.is_from_assistant() {
            return Err(ValidationError::new("message_id", "Notes can only be attached to assistant answers").into());
        }
        self.chats.find_accessible(user, answer.chat_id).await?;

        let content = format!("{}\n{}", ADVISOR_NOTE_PREFIX, note);
        let saved = self
            .messages
            .create(NewMessage::advisor_note(answer.chat_id, user.user_id, content))
            .await?;

        info!(chat_id = answer.chat_id, user_id = user.user_id, "Advisor note added");
        Ok(saved)
    }

    pub async fn status(&self) -> UsageReport {
        self.governor.report().await
    }

    /// Connectivity, load and cache diagnostics for the context bucket.
    pub async fn check_contexts(&self) -> ContextCheck {
        let mut check = ContextCheck {
            bucket: self.contexts.bucket().to_string(),
            ..ContextCheck::default()
        };

        match self.contexts.check_connection().await {
            Ok(connection) => {
                check.connected = true;
                check.object_count = Some(connection.object_count);
            }
            Err(e) => check.connection_error = Some(e.to_string()),
        }

        match self.contexts.load_all().await {
            Ok(loaded) => check.loaded_files = loaded.len(),
            Err(e) => check.load_error = Some(e.to_string()),
        }

        match self.contexts.list_available().await {
            Ok(available) => check.available = available,
            Err(e) => warn!(error = %e, "Could not list context files"),
        }

        check.cache = Some(self.contexts.summary().await);
        check
    }

    async fn find_message(&self, id: i64) -> Result<Message, ServiceError> {
        self.messages
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Message {} not found", id)))
    }
}
