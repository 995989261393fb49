//! Conversation turn model shared by chat handles.

use std::fmt;
use uuid::Uuid;

/// Author of a conversation turn.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    /// Text written (or spoken) by the end user.
    User,
    /// Text generated by the remote model.
    Model,
}

impl Role {
    /// Stable string form, matching the Gemini content roles.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single turn of a conversation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    /// Who produced the text.
    pub role: Role,
    /// Turn content.
    pub text: String,
}

impl Message {
    /// Build a user turn.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// Build a model turn.
    #[must_use]
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Identifier of one conversation handle.
///
/// A fresh id is minted every time a handle is created, so a replaced handle
/// can always be told apart from its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(pub Uuid);

impl HandleId {
    /// Create a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_matches_gemini_names() {
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Model.to_string(), "model");
    }

    #[test]
    fn test_message_constructors_set_role() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::model("hello").role, Role::Model);
    }

    #[test]
    fn test_handle_ids_are_unique() {
        assert_ne!(HandleId::new(), HandleId::new());
    }
}
