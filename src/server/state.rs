//! Application state shared across all request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::AppConfig;
use crate::llm::{GeminiChatClient, GeminiClient, LlmResult};
use crate::session::ChatSessionManager;
use crate::speech::{GeminiTranscriber, SpeechTranscriber};

/// Shared application state.
pub struct AppState {
    /// Conversation lifecycle and recovery.
    pub sessions: ChatSessionManager,
    /// Speech-to-text adapter for audio uploads.
    pub transcriber: Arc<dyn SpeechTranscriber>,
    /// Model name reported by the health endpoint.
    pub model_name: String,
    /// Directory served under `/static`. The UI page itself is compiled in.
    pub static_dir: PathBuf,
    /// When the server state was built.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build the production state: Gemini for both chat and transcription.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &AppConfig) -> LlmResult<Arc<Self>> {
        let gemini = Arc::new(GeminiClient::new(
            config.api_key.clone(),
            config.model.clone(),
            config.base_url.clone(),
            config.request_timeout,
        )?);

        let sessions = ChatSessionManager::new(
            Arc::new(GeminiChatClient::new(Arc::clone(&gemini), config.history_turns)),
            config.session.clone(),
        );
        let transcriber: Arc<dyn SpeechTranscriber> = Arc::new(GeminiTranscriber::new(gemini));

        Ok(Arc::new(Self {
            sessions,
            transcriber,
            model_name: config.model.clone(),
            static_dir: config.static_dir.clone(),
            started_at: Utc::now(),
        }))
    }
}
