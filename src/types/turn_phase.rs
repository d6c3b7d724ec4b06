use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a turn is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnPhase {
    /// No text has arrived yet.
    #[default]
    Idle,
    /// The most recent text was reasoning.
    Reasoning,
    /// The most recent text was answer text.
    Answering,
    /// The source was exhausted normally.
    Done,
    /// The source failed.
    Failed,
}

impl TurnPhase {
    /// Returns true once the turn can accept no more fragments.
    pub fn is_terminal(self) -> bool {
        matches!(self, TurnPhase::Done | TurnPhase::Failed)
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnPhase::Idle => write!(f, "idle"),
            TurnPhase::Reasoning => write!(f, "reasoning"),
            TurnPhase::Answering => write!(f, "answering"),
            TurnPhase::Done => write!(f, "done"),
            TurnPhase::Failed => write!(f, "failed"),
        }
    }
}
