//! Generative-AI gateway.

pub mod gemini;
pub mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use gemini::GeminiClient;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("AI provider blocked the prompt: {0}")]
    Blocked(String),

    #[error("AI provider returned no text")]
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    Standard,
    /// Deliberate answer: higher temperature, no chat history.
    Thinking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub question: String,
    pub contexts: Vec<String>,
    pub history: Vec<HistoryTurn>,
    pub mode: GenerationMode,
}

#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    /// Provider-reported total, when available.
    pub total_tokens: Option<u64>,
}

#[async_trait]
pub trait GenerativeAi: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, AiError>;

    fn model_name(&self) -> &str;
}

/// Rough token count: four characters per token.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() / 4) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_four_chars_per_token() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("ação"), 1);
    }

    #[test]
    fn mode_uses_snake_case() {
        let mode: GenerationMode = serde_json::from_str("\"thinking\"").unwrap();
        assert_eq!(mode, GenerationMode::Thinking);
        assert_eq!(GenerationMode::default(), GenerationMode::Standard);
    }
}
