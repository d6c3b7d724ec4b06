use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::{ChatMessage, Fragment};

/// One newline-delimited JSON record of a streamed chat response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatChunk {
    /// The model that produced this record.
    #[serde(default)]
    pub model: String,

    /// When the server produced this record.
    #[serde(default, with = "crate::utils::time::option")]
    pub created_at: Option<OffsetDateTime>,

    /// The message slice carried by this record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChatMessage>,

    /// True on the final record of the stream.
    #[serde(default)]
    pub done: bool,

    /// Why generation stopped, e.g. `stop` or `length`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,

    /// An error reported in-band by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatChunk {
    /// Converts this record into a fragment.
    ///
    /// `message.thinking` becomes the reasoning slice and `message.content` the answer slice.
    /// Empty strings are dropped so that a record with neither yields a keep-alive.
    pub fn into_fragment(self) -> Fragment {
        let Some(message) = self.message else {
            return Fragment::keep_alive();
        };
        Fragment {
            reasoning: message.thinking.filter(|s| !s.is_empty()),
            answer: Some(message.content).filter(|s| !s.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thinking_line() {
        let chunk: ChatChunk = serde_json::from_str(
            r#"{"model":"qwen3:0.6b","created_at":"2025-06-01T10:00:00.5Z","message":{"role":"assistant","content":"","thinking":"Let"},"done":false}"#,
        )
        .unwrap();
        assert!(chunk.created_at.is_some());
        assert!(!chunk.done);
        assert_eq!(chunk.into_fragment(), Fragment::reasoning("Let"));
    }

    #[test]
    fn answer_line() {
        let chunk: ChatChunk = serde_json::from_str(
            r#"{"model":"qwen3:0.6b","message":{"role":"assistant","content":"Hi"},"done":false}"#,
        )
        .unwrap();
        assert_eq!(chunk.into_fragment(), Fragment::answer("Hi"));
    }

    #[test]
    fn final_line_is_keep_alive() {
        let chunk: ChatChunk = serde_json::from_str(
            r#"{"model":"qwen3:0.6b","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop","total_duration":1234}"#,
        )
        .unwrap();
        assert!(chunk.done);
        assert_eq!(chunk.done_reason.as_deref(), Some("stop"));
        assert!(chunk.into_fragment().is_keep_alive());
    }

    #[test]
    fn error_line() {
        let chunk: ChatChunk = serde_json::from_str(r#"{"error":"model runner crashed"}"#).unwrap();
        assert_eq!(chunk.error.as_deref(), Some("model runner crashed"));
        assert!(chunk.message.is_none());
    }
}
