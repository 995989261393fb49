//! Error types for the remote chat client.

use thiserror::Error;

/// Errors produced while talking to the hosted model.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport failure (connect, timeout, body decoding).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("model API returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message extracted from the response body.
        message: String,
    },

    /// The response carried no text candidate.
    #[error("model returned no text in the response candidates")]
    EmptyResponse,

    /// The prompt or the reply was blocked by safety filters.
    #[error("model blocked the request: {0}")]
    Blocked(String),

    /// Client could not be configured.
    #[error("client configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Whether the failure is likely transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(err) => err.is_connect() || err.is_timeout(),
            Self::Status { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::EmptyResponse | Self::Blocked(_) | Self::Config(_) => false,
        }
    }
}

/// Convenience result alias for remote chat operations.
pub type LlmResult<T> = Result<T, LlmError>;
