//! Error types for chat session management.

use thiserror::Error;

use crate::llm::LlmError;

/// Errors surfaced by the session manager.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Remote chat call or session initialization failed.
    #[error("remote chat service error: {0}")]
    Remote(#[from] LlmError),

    /// Too many consecutive failures; the session refuses calls for a while.
    #[error("chat session paused after repeated failures, retry in {retry_in_secs}s")]
    CircuitOpen {
        /// Seconds until calls are accepted again.
        retry_in_secs: u64,
    },
}

/// Convenience result alias for session operations.
pub type ChatResult<T> = Result<T, ChatError>;
