use serde::{Deserialize, Serialize};

/// One incremental unit of a streamed response.
///
/// A fragment may carry reasoning text, answer text, both, or neither.  A fragment with
/// neither is a keep-alive and produces no render events.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fragment {
    /// A slice of "thinking" content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// A slice of final answer content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl Fragment {
    /// Creates a fragment that carries only reasoning text.
    pub fn reasoning<S: Into<String>>(text: S) -> Self {
        Self {
            reasoning: Some(text.into()),
            answer: None,
        }
    }

    /// Creates a fragment that carries only answer text.
    pub fn answer<S: Into<String>>(text: S) -> Self {
        Self {
            reasoning: None,
            answer: Some(text.into()),
        }
    }

    /// Creates a fragment that carries both reasoning and answer text.
    pub fn both<R: Into<String>, A: Into<String>>(reasoning: R, answer: A) -> Self {
        Self {
            reasoning: Some(reasoning.into()),
            answer: Some(answer.into()),
        }
    }

    /// Creates an empty keep-alive fragment.
    pub fn keep_alive() -> Self {
        Self::default()
    }

    /// Returns the reasoning text if it is present and non-empty.
    pub fn reasoning_text(&self) -> Option<&str> {
        self.reasoning.as_deref().filter(|s| !s.is_empty())
    }

    /// Returns the answer text if it is present and non-empty.
    pub fn answer_text(&self) -> Option<&str> {
        self.answer.as_deref().filter(|s| !s.is_empty())
    }

    /// Returns true if this fragment carries no text at all.
    pub fn is_keep_alive(&self) -> bool {
        self.reasoning_text().is_none() && self.answer_text().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_strings_count_as_absent() {
        let fragment = Fragment {
            reasoning: Some(String::new()),
            answer: Some(String::new()),
        };
        assert!(fragment.reasoning_text().is_none());
        assert!(fragment.answer_text().is_none());
        assert!(fragment.is_keep_alive());
        assert!(Fragment::keep_alive().is_keep_alive());
    }

    #[test]
    fn both_fields() {
        let fragment = Fragment::both("hmm", "Hi");
        assert_eq!(fragment.reasoning_text(), Some("hmm"));
        assert_eq!(fragment.answer_text(), Some("Hi"));
        assert!(!fragment.is_keep_alive());
    }

    #[test]
    fn serialization_skips_absent_fields() {
        let json = serde_json::to_string(&Fragment::answer("Hi")).unwrap();
        assert_eq!(json, r#"{"answer":"Hi"}"#);
    }
}
