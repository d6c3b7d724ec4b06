//! Configuration types for the front ends.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! [`ChatConfig`].  Settings are layered: command-line flags win over a YAML
//! configuration file, which wins over the `OLLAMA_BASE_URL` / `OLLAMA_MODEL`
//! environment variables, which win over the built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use arrrg_derive::CommandLine;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::aggregator::ReasoningUpdates;
use crate::client::{ClientConfig, DEFAULT_BASE_URL};
use crate::error::{Error, Result};

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "qwen3:0.6b";

/// Environment variable naming the server address.
pub const BASE_URL_ENV: &str = "OLLAMA_BASE_URL";

/// Environment variable naming the model.
pub const MODEL_ENV: &str = "OLLAMA_MODEL";

/// Command-line arguments shared by the convocode front ends.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Address of the model server.
    #[arrrg(optional, "Model server address (default: http://127.0.0.1:11434)", "URL")]
    pub base_url: Option<String>,

    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: qwen3:0.6b)", "MODEL")]
    pub model: Option<String>,

    /// Comma-separated list of selectable models.
    #[arrrg(optional, "Comma-separated list of selectable models", "MODELS")]
    pub models: Option<String>,

    /// YAML configuration file.
    #[arrrg(optional, "YAML configuration file", "FILE")]
    pub config: Option<String>,

    /// Which reasoning updates to show.
    #[arrrg(optional, "Reasoning updates to show: continuous, first", "MODE")]
    pub reasoning: Option<String>,

    /// Ask thinking models to reason before answering.
    #[arrrg(flag, "Ask the model to reason before answering")]
    pub think: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Record fragments and events as JSON lines.
    #[arrrg(optional, "Append a JSON-lines record of each turn to FILE", "FILE")]
    pub log_file: Option<String>,
}

/// The optional settings a YAML configuration file may carry.
///
/// ```yaml
/// base_url: http://gpu-box:11434
/// model: qwen3:8b
/// models: [qwen3:0.6b, qwen3:8b]
/// reasoning: first
/// think: true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Address of the model server.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model to use.
    #[serde(default)]
    pub model: Option<String>,
    /// Selectable models.
    #[serde(default)]
    pub models: Option<Vec<String>>,
    /// Which reasoning updates to show.
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Whether to request reasoning.
    #[serde(default)]
    pub think: Option<bool>,
    /// Whether to use ANSI colors.
    #[serde(default)]
    pub color: Option<bool>,
    /// JSON-lines log file.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl FileConfig {
    /// Loads a configuration file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::io(format!("Failed to read {}: {e}", path.display()), e)
        })?;
        Self::parse(&contents)
    }

    /// Parses configuration from YAML text.
    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// Resolved configuration for a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Address of the model server.
    pub base_url: String,

    /// Model used for new turns.
    pub model: String,

    /// Models the user may switch between.  Empty means "ask the server".
    pub models: Vec<String>,

    /// Which reasoning updates the aggregator surfaces.
    pub reasoning_updates: ReasoningUpdates,

    /// Whether to ask the model to reason.  `None` leaves it to the server.
    pub think: Option<bool>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Where to append the JSON-lines turn log, if anywhere.
    pub log_file: Option<PathBuf>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Server: http://127.0.0.1:11434
    /// - Model: qwen3:0.6b
    /// - Reasoning updates: continuous
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            models: Vec::new(),
            reasoning_updates: ReasoningUpdates::default(),
            think: None,
            use_color: true,
            log_file: None,
        }
    }

    /// Resolves configuration from arguments, the optional config file they name, and
    /// the process environment.
    pub fn resolve(args: ChatArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => Some(FileConfig::load(path)?),
            None => None,
        };
        Self::layered(args, file, |key| std::env::var(key).ok())
    }

    /// Resolves configuration from explicit layers.
    ///
    /// `env` looks up environment variables; empty values count as unset.
    pub fn layered<F>(args: ChatArgs, file: Option<FileConfig>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file.unwrap_or_default();
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::new();

        let base_url = args
            .base_url
            .or(file.base_url)
            .or_else(|| env(BASE_URL_ENV))
            .unwrap_or(defaults.base_url);
        let model = args
            .model
            .or(file.model)
            .or_else(|| env(MODEL_ENV))
            .unwrap_or(defaults.model);
        let models = match args.models {
            Some(list) => parse_model_list(&list),
            None => file.models.unwrap_or_default(),
        };
        let reasoning_updates = match args.reasoning.or(file.reasoning) {
            Some(mode) => mode.parse::<ReasoningUpdates>().map_err(|e| {
                Error::validation(e, Some("reasoning".to_string()))
            })?,
            None => defaults.reasoning_updates,
        };
        let think = if args.think { Some(true) } else { file.think };
        let use_color = !args.no_color && file.color.unwrap_or(true);
        let log_file = args.log_file.map(PathBuf::from).or(file.log_file);

        let config = Self {
            base_url,
            model,
            models,
            reasoning_updates,
            think,
            use_color,
            log_file,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration can be used to open a conversation.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            Error::validation(
                format!("invalid server address '{}': {e}", self.base_url),
                Some("base_url".to_string()),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::validation(
                format!("server address must be http or https: {}", self.base_url),
                Some("base_url".to_string()),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(Error::validation(
                "model must not be empty",
                Some("model".to_string()),
            ));
        }
        Ok(())
    }

    /// Returns the settings for a client talking to the configured server.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.base_url.clone())
    }

    /// Sets the server address.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the selectable models.
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    /// Sets which reasoning updates are surfaced.
    pub fn with_reasoning_updates(mut self, reasoning_updates: ReasoningUpdates) -> Self {
        self.reasoning_updates = reasoning_updates;
        self
    }

    /// Sets whether reasoning is requested.
    pub fn with_think(mut self, think: Option<bool>) -> Self {
        self.think = think;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_model_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
