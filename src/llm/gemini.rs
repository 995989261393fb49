//! Gemini REST client.
//!
//! Talks to `generateContent` directly. The API is stateless, so each
//! [`GeminiChat`] keeps the conversation history itself and resends it with
//! every turn.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{LlmError, LlmResult};
use super::message::{HandleId, Message};
use super::{ChatClient, ChatHandle};

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

/// Default base URL of the Gemini models endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// HTTP connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the API key (keeps the key out of request URLs and error messages).
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Leading turns kept when history is trimmed (persona preamble and its reply).
const PINNED_MESSAGES: usize = 2;

/// Threshold applied to every harm category.
const SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

/// Harm categories filtered on every request.
const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Sampling parameters sent with every request.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling mass.
    pub top_p: f32,
    /// Top-k sampling cutoff.
    pub top_k: u32,
    /// Reply length budget in tokens.
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.9,
            top_p: 1.0,
            top_k: 1,
            max_output_tokens: 2048,
        }
    }
}

/// One safety filter entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SafetySetting {
    /// Harm category name.
    pub category: String,
    /// Blocking threshold name.
    pub threshold: String,
}

/// Medium-and-above blocking for harassment, hate speech, sexual and dangerous content.
#[must_use]
pub fn default_safety_settings() -> Vec<SafetySetting> {
    HARM_CATEGORIES
        .iter()
        .map(|category| SafetySetting {
            category: (*category).to_string(),
            threshold: SAFETY_THRESHOLD.to_string(),
        })
        .collect()
}

/// Content block of a request.
#[derive(Clone, Debug, Serialize)]
pub struct Content {
    /// `user` or `model`; omitted for system instructions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Ordered parts of the block.
    pub parts: Vec<Part>,
}

impl Content {
    /// Build a content block from a conversation turn.
    #[must_use]
    pub fn from_message(message: &Message) -> Self {
        Self {
            role: Some(message.role.as_str().to_string()),
            parts: vec![Part::Text {
                text: message.text.clone(),
            }],
        }
    }
}

/// One part of a content block.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Part {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// Base64-encoded binary payload (audio, images).
    InlineData {
        /// Payload and MIME type.
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

/// Inline binary payload.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type of the decoded bytes.
    pub mime_type: String,
    /// Base64 data.
    pub data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: &'a GenerationConfig,
    safety_settings: &'a [SafetySetting],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Low-level Gemini API client shared by chat and transcription.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
    generation: GenerationConfig,
    safety: Vec<SafetySetting>,
}

impl GeminiClient {
    /// Build a client for `model` with default sampling and safety settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> LlmResult<Self> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            generation: GenerationConfig::default(),
            safety: default_safety_settings(),
        })
    }

    /// Run one `generateContent` call and return the reply text.
    ///
    /// `system` is sent as the request's `systemInstruction` when present.
    ///
    /// # Errors
    /// Returns an error on transport failure, non-success status, a blocked
    /// prompt, or a reply without text.
    pub async fn generate(&self, contents: &[Content], system: Option<&str>) -> LlmResult<String> {
        let request = GenerateContentRequest {
            contents,
            system_instruction: system.map(|text| Content {
                role: None,
                parts: vec![Part::Text {
                    text: text.to_string(),
                }],
            }),
            generation_config: &self.generation,
            safety_settings: &self.safety,
        };

        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        debug!(model = %self.model, turns = contents.len(), "Sending generateContent request");

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(map_http_error(status, &body));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        extract_text(parsed)
    }
}

/// Pull the reply text out of a parsed response.
fn extract_text(response: GenerateContentResponse) -> LlmResult<String> {
    let block_reason = response.prompt_feedback.and_then(|f| f.block_reason);

    let Some(candidate) = response.candidates.and_then(|c| c.into_iter().next()) else {
        return Err(block_reason.map_or(LlmError::EmptyResponse, LlmError::Blocked));
    };

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }

    match candidate.finish_reason.as_deref() {
        Some("SAFETY") => Err(LlmError::Blocked("SAFETY".to_string())),
        _ => Err(LlmError::EmptyResponse),
    }
}

fn map_http_error(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorWrapper>(body).map_or_else(
        |_| body.to_string(),
        |wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        },
    );

    LlmError::Status {
        status: status.as_u16(),
        message,
    }
}

/// [`ChatClient`] backed by Gemini.
#[derive(Clone)]
pub struct GeminiChatClient {
    client: Arc<GeminiClient>,
    max_turns: usize,
}

impl GeminiChatClient {
    /// Wrap a shared low-level client.
    ///
    /// Each conversation resends at most `max_turns` recent exchanges after
    /// the persona preamble.
    #[must_use]
    pub const fn new(client: Arc<GeminiClient>, max_turns: usize) -> Self {
        Self { client, max_turns }
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn start_session(&self, history: Vec<Message>) -> LlmResult<Box<dyn ChatHandle>> {
        let chat = GeminiChat {
            id: HandleId::new(),
            client: Arc::clone(&self.client),
            history,
            max_turns: self.max_turns,
        };
        debug!(handle = %chat.id, "Opened Gemini chat");
        Ok(Box::new(chat))
    }
}

/// One Gemini conversation with locally owned history.
pub struct GeminiChat {
    id: HandleId,
    client: Arc<GeminiClient>,
    history: Vec<Message>,
    max_turns: usize,
}

#[async_trait]
impl ChatHandle for GeminiChat {
    fn id(&self) -> HandleId {
        self.id
    }

    fn history(&self) -> &[Message] {
        &self.history
    }

    async fn send(&mut self, text: &str) -> LlmResult<String> {
        let user = Message::user(text);
        let contents: Vec<Content> = self
            .history
            .iter()
            .chain(std::iter::once(&user))
            .map(Content::from_message)
            .collect();

        let reply = self.client.generate(&contents, None).await?;

        self.history.push(user);
        self.history.push(Message::model(reply.clone()));
        trim_history(&mut self.history, self.max_turns);
        Ok(reply)
    }
}

/// Drop the oldest exchanges beyond `max_turns`, keeping the pinned preamble.
fn trim_history(history: &mut Vec<Message>, max_turns: usize) {
    let keep = max_turns.saturating_mul(2);
    let excess = history.len().saturating_sub(PINNED_MESSAGES + keep);
    if excess > 0 {
        history.drain(PINNED_MESSAGES..PINNED_MESSAGES + excess);
    }
}
