//! Conversation state: persona prompts and the session manager.

pub mod error;
pub mod manager;
pub mod prompt;

pub use error::{ChatError, ChatResult};
pub use manager::{ChatSessionManager, SessionKey, SessionPolicy};
pub use prompt::build_prompt;
