//! Transcription through Gemini's audio understanding.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use tracing::debug;

use super::{AudioClip, SpeechTranscriber, TranscriptionError};
use crate::llm::LlmError;
use crate::llm::gemini::{Content, GeminiClient, InlineData, Part};

/// System instruction sent with every audio payload.
const TRANSCRIBE_INSTRUCTION: &str = "Transcribe the speech in this audio verbatim. \
Reply with the transcript only, without quotes or commentary. \
If there is no intelligible speech, reply with exactly NO_SPEECH.";

/// Marker the model returns when nothing was said.
const NO_SPEECH_MARKER: &str = "NO_SPEECH";

/// [`SpeechTranscriber`] that sends audio inline to Gemini.
pub struct GeminiTranscriber {
    client: Arc<GeminiClient>,
}

impl GeminiTranscriber {
    /// Wrap a shared low-level client.
    #[must_use]
    pub const fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SpeechTranscriber for GeminiTranscriber {
    async fn transcribe(&self, clip: AudioClip) -> Result<String, TranscriptionError> {
        debug!(bytes = clip.bytes.len(), mime = %clip.mime_type, "Transcribing audio");

        let contents = [build_request(&clip)];
        match self.client.generate(&contents, Some(TRANSCRIBE_INSTRUCTION)).await {
            Ok(text) => normalize_transcript(&text),
            Err(LlmError::EmptyResponse) => Err(TranscriptionError::Unrecognized),
            Err(err) => Err(err.into()),
        }
    }
}

fn build_request(clip: &AudioClip) -> Content {
    Content {
        role: Some("user".to_string()),
        parts: vec![Part::InlineData {
            inline_data: InlineData {
                mime_type: clip.mime_type.clone(),
                data: BASE64_STANDARD.encode(&clip.bytes),
            },
        }],
    }
}

fn normalize_transcript(raw: &str) -> Result<String, TranscriptionError> {
    let text = raw.trim().trim_matches('"').trim();
    if text.is_empty() || text == NO_SPEECH_MARKER {
        return Err(TranscriptionError::Unrecognized);
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_transcript_trims_quotes() {
        let text = normalize_transcript("  \"I drive to work every day\"\n").ok();
        assert_eq!(text.as_deref(), Some("I drive to work every day"));
    }

    #[test]
    fn test_normalize_transcript_no_speech() {
        assert!(matches!(
            normalize_transcript("NO_SPEECH"),
            Err(TranscriptionError::Unrecognized)
        ));
        assert!(matches!(
            normalize_transcript("   "),
            Err(TranscriptionError::Unrecognized)
        ));
    }

    #[test]
    fn test_build_request_encodes_audio() {
        let clip = AudioClip::new(vec![0, 1, 2], Some("audio/webm"));
        let value = serde_json::to_value(build_request(&clip)).unwrap_or_default();
        assert_eq!(value["role"], "user");
        assert_eq!(value["parts"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["parts"][0]["inlineData"]["mimeType"], "audio/webm");
        assert_eq!(value["parts"][0]["inlineData"]["data"], "AAEC");
    }
}
