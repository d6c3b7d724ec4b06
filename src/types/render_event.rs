use serde::{Deserialize, Serialize};

/// One observable update produced by the turn aggregator.
///
/// Sinks apply these in emission order without inspecting aggregator state.  Both
/// `...Updated` variants carry the full content to date, never a delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "text", rename_all = "snake_case")]
pub enum RenderEvent {
    /// The first non-empty reasoning text of the turn has arrived.
    ThinkingStarted,
    /// The reasoning text to date.
    ThinkingUpdated(String),
    /// The first non-empty answer text of the turn has arrived.
    ResponseStarted,
    /// The fully re-rendered answer to date.
    ResponseUpdated(String),
    /// The turn ended abnormally.
    TurnFailed(String),
    /// The source was exhausted normally.
    TurnCompleted,
}

impl RenderEvent {
    /// Returns true for the two events that end a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RenderEvent::TurnFailed(_) | RenderEvent::TurnCompleted)
    }

    /// Returns the text carried by this event, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            RenderEvent::ThinkingUpdated(text)
            | RenderEvent::ResponseUpdated(text)
            | RenderEvent::TurnFailed(text) => Some(text),
            RenderEvent::ThinkingStarted
            | RenderEvent::ResponseStarted
            | RenderEvent::TurnCompleted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_events() {
        assert!(RenderEvent::TurnCompleted.is_terminal());
        assert!(RenderEvent::TurnFailed("boom".to_string()).is_terminal());
        assert!(!RenderEvent::ResponseStarted.is_terminal());
        assert!(!RenderEvent::ThinkingUpdated("x".to_string()).is_terminal());
    }

    #[test]
    fn tagged_serialization() {
        assert_eq!(
            serde_json::to_string(&RenderEvent::ResponseUpdated("Hi".to_string())).unwrap(),
            r#"{"event":"response_updated","text":"Hi"}"#
        );
        assert_eq!(
            serde_json::to_string(&RenderEvent::TurnCompleted).unwrap(),
            r#"{"event":"turn_completed"}"#
        );
    }
}
