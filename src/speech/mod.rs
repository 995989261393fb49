//! Speech-to-text adapters used by the audio endpoint.

pub mod gemini;

pub use gemini::GeminiTranscriber;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::LlmError;

/// Fallback MIME type when the upload does not declare one.
pub const DEFAULT_AUDIO_MIME: &str = "audio/wav";

/// Uploaded audio awaiting transcription.
#[derive(Clone, Debug)]
pub struct AudioClip {
    /// Raw audio bytes as uploaded.
    pub bytes: Vec<u8>,
    /// MIME type of the bytes.
    pub mime_type: String,
}

impl AudioClip {
    /// Build a clip, defaulting the MIME type when the upload did not carry a usable one.
    #[must_use]
    pub fn new(bytes: Vec<u8>, mime_type: Option<&str>) -> Self {
        let mime_type = mime_type
            .map(str::trim)
            .filter(|m| m.starts_with("audio/") || m.starts_with("video/"))
            .unwrap_or(DEFAULT_AUDIO_MIME)
            .to_string();
        Self { bytes, mime_type }
    }

    /// Whether the upload carried no data.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Errors produced by speech transcription.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// No speech could be recognized in the audio.
    #[error("could not understand the audio")]
    Unrecognized,

    /// The transcription service failed.
    #[error("transcription service error: {0}")]
    Remote(#[from] LlmError),
}

/// Converts audio into text.
#[async_trait]
pub trait SpeechTranscriber: Send + Sync {
    /// Transcribe `clip` to plain text.
    ///
    /// # Errors
    /// Returns [`TranscriptionError::Unrecognized`] when no speech is found,
    /// or [`TranscriptionError::Remote`] when the service call fails.
    async fn transcribe(&self, clip: AudioClip) -> Result<String, TranscriptionError>;
}
