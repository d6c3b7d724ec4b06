use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A model installed on the server, as listed by `GET /api/tags`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    /// The identifier used in chat requests, e.g. `qwen3:0.6b`.
    pub name: String,

    /// Size on disk in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// When the model was last pulled.
    #[serde(
        default,
        with = "crate::utils::time::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub modified_at: Option<OffsetDateTime>,
}

/// The response body of `GET /api/tags`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelList {
    /// Installed models.
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

impl ModelList {
    /// Returns the model identifiers in server order.
    pub fn names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name.clone()).collect()
    }
}
