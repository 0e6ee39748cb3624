use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::prompt::{build_prompt, build_thinking_prompt, system_instruction};
use super::{AiError, ChatRole, Generation, GenerationMode, GenerationRequest, GenerativeAi};

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];
const BLOCK_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

impl GenerationSettings {
    fn for_mode(mode: GenerationMode) -> Self {
        let standard = Self {
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 8192,
        };
        match mode {
            GenerationMode::Standard => standard,
            GenerationMode::Thinking => Self {
                temperature: 0.9,
                ..standard
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<ChatRole>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<ChatRole>, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part { text: Some(text.into()) }],
        }
    }
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationSettings,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: SecretString,
    thinking_mode: bool,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
        thinking_mode: bool,
    ) -> Result<Self, AiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            thinking_mode,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_body(&self, request: &GenerationRequest) -> GenerateContentRequest {
        let contents = match request.mode {
            GenerationMode::Standard => {
                let mut contents: Vec<Content> = request
                    .history
                    .iter()
                    .map(|turn| Content::text(Some(turn.role), turn.text.clone()))
                    .collect();
                contents.push(Content::text(
                    Some(ChatRole::User),
                    build_prompt(&request.question, &request.contexts),
                ));
                contents
            }
            GenerationMode::Thinking => vec![Content::text(
                Some(ChatRole::User),
                build_thinking_prompt(&request.question, &request.contexts),
            )],
        };

        GenerateContentRequest {
            system_instruction: Content::text(None, system_instruction(self.thinking_mode)),
            contents,
            generation_config: GenerationSettings::for_mode(request.mode),
            safety_settings: HARM_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: BLOCK_THRESHOLD,
                })
                .collect(),
        }
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<Generation, AiError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(AiError::Blocked(reason));
    }

    let candidate = response.candidates.into_iter().next().ok_or(AiError::EmptyResponse)?;
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_default();
        return if matches!(reason.as_str(), "SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT") {
            Err(AiError::Blocked(reason))
        } else {
            Err(AiError::EmptyResponse)
        };
    }

    Ok(Generation {
        text,
        total_tokens: response.usage_metadata.and_then(|u| u.total_token_count),
    })
}

#[async_trait]
impl GenerativeAi for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, AiError> {
        let body = self.build_body(&request);
        debug!(
            model = %self.model,
            mode = ?request.mode,
            history = request.history.len(),
            contexts = request.contexts.len(),
            "Sending prompt to Gemini"
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let generation = extract_text(response.json().await?)?;
        info!(model = %self.model, tokens = ?generation.total_tokens, "Gemini answered");
        Ok(generation)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::HistoryTurn;
    use serde_json::{json, Value};

    fn client() -> GeminiClient {
        GeminiClient::new(
            "http://localhost:9999/",
            "gemini-2.5-flash",
            SecretString::from("test-key"),
            Duration::from_secs(5),
            true,
        )
        .unwrap()
    }

    #[test]
    fn endpoint_includes_model() {
        assert_eq!(
            client().endpoint(),
            "http://localhost:9999/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn standard_body_carries_history_and_settings() {
        let request = GenerationRequest {
            question: "Como começo?".to_string(),
            contexts: vec![],
            history: vec![
                HistoryTurn { role: ChatRole::User, text: "Oi".to_string() },
                HistoryTurn { role: ChatRole::Model, text: "Olá!".to_string() },
            ],
            mode: GenerationMode::Standard,
        };
        let body: Value = serde_json::to_value(client().build_body(&request)).unwrap();

        assert_eq!(body["contents"].as_array().unwrap().len(), 3);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "Student question: Como começo?");
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
        assert!(body["systemInstruction"].get("role").is_none());
    }

    #[test]
    fn thinking_body_drops_history() {
        let request = GenerationRequest {
            question: "Q".to_string(),
            history: vec![HistoryTurn { role: ChatRole::User, text: "old".to_string() }],
            mode: GenerationMode::Thinking,
            ..GenerationRequest::default()
        };
        let body: Value = serde_json::to_value(client().build_body(&request)).unwrap();
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        let temperature = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.9).abs() < 1e-6);
    }

    #[test]
    fn extracts_text_and_usage() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Olá, " }, { "text": "tudo bem?" }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 10, "totalTokenCount": 42 }
        }))
        .unwrap();
        let generation = extract_text(response).unwrap();
        assert_eq!(generation.text, "Olá, tudo bem?");
        assert_eq!(generation.total_tokens, Some(42));
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        assert!(matches!(extract_text(response), Err(AiError::Blocked(reason)) if reason == "SAFETY"));
    }

    #[test]
    fn empty_candidates_are_an_error() {
        let response: GenerateContentResponse = serde_json::from_value(json!({ "candidates": [] })).unwrap();
        assert!(matches!(extract_text(response), Err(AiError::EmptyResponse)));
    }
}
