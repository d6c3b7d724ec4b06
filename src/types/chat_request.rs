use serde::{Deserialize, Serialize};

use crate::types::ChatMessage;

/// The body of a streaming chat request.
///
/// Each request carries the full message list for one turn.  This crate only ever sends a
/// single user message; history is not kept between turns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// Model identifier, e.g. `qwen3:0.6b`.
    pub model: String,

    /// The role-tagged messages for this turn.
    pub messages: Vec<ChatMessage>,

    /// Whether the server should stream the response.  Always true when sent by this crate.
    #[serde(default)]
    pub stream: bool,

    /// Ask thinking models to separate reasoning from the answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub think: Option<bool>,
}

impl ChatRequest {
    /// Creates a streaming request for the given model and messages.
    pub fn new<S: Into<String>>(model: S, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            think: None,
        }
    }

    /// Creates a streaming request holding a single user message.
    pub fn for_prompt<M: Into<String>, P: Into<String>>(model: M, prompt: P) -> Self {
        Self::new(model, vec![ChatMessage::user(prompt)])
    }

    /// Sets whether reasoning should be requested.
    pub fn with_think(mut self, think: Option<bool>) -> Self {
        self.think = think;
        self
    }
}
