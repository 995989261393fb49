//! Remote chat client abstractions and the Gemini implementation.
//!
//! A [`ChatClient`] opens conversations; each conversation is a
//! [`ChatHandle`] that owns its ordered turn history and appends to it on
//! every successful exchange.

pub mod error;
pub mod gemini;
pub mod message;

pub use error::{LlmError, LlmResult};
pub use gemini::{GeminiChatClient, GeminiClient, GenerationConfig, SafetySetting};
pub use message::{HandleId, Message, Role};

use async_trait::async_trait;

/// Factory for conversation handles against a hosted model.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Open a new conversation seeded with `history`.
    ///
    /// # Errors
    /// Returns an error if the remote service refuses to open a session.
    async fn start_session(&self, history: Vec<Message>) -> LlmResult<Box<dyn ChatHandle>>;
}

/// A running exchange with the hosted model.
#[async_trait]
pub trait ChatHandle: Send {
    /// Identifier minted when the handle was created.
    fn id(&self) -> HandleId;

    /// Turns exchanged so far, oldest first.
    fn history(&self) -> &[Message];

    /// Send a user turn and return the model's reply.
    ///
    /// On success both the user turn and the reply are appended to the
    /// history. On failure the history is left unchanged.
    ///
    /// # Errors
    /// Returns an error if the remote call fails or yields no text.
    async fn send(&mut self, text: &str) -> LlmResult<String>;
}
