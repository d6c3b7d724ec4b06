use serde::{Deserialize, Serialize};

use crate::types::MessageRole;

/// A role-tagged message in a chat request or a streamed response line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Who wrote the message.
    #[serde(default)]
    pub role: MessageRole,

    /// The answer text.  Streamed responses carry a slice per line.
    #[serde(default)]
    pub content: String,

    /// Reasoning text, present only on streamed responses from thinking models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
}

impl ChatMessage {
    /// Creates a new message with the given role and content.
    pub fn new<S: Into<String>>(role: MessageRole, content: S) -> Self {
        Self {
            role,
            content: content.into(),
            thinking: None,
        }
    }

    /// Creates a user message.
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Creates a system message.
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::new(MessageRole::System, content)
    }
}
