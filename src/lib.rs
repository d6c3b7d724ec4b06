//! Streaming chat front ends for a locally-hosted model server.
//!
//! A [`ChunkSource`] yields the [`Fragment`]s of one turn, a [`TurnAggregator`] turns them
//! into ordered [`RenderEvent`]s, and a [`RenderSink`] applies those events to a terminal,
//! a log channel, or a UI panel.

// Public modules
pub mod aggregator;
pub mod chat;
pub mod client;
pub mod error;
pub mod markdown;
pub mod ndjson;
pub mod observability;
pub mod render;
pub mod source;
pub mod turn_logger;
pub mod types;
pub mod utils;

// Re-exports
pub use aggregator::{ReasoningUpdates, TurnAggregator};
pub use client::{ClientConfig, Ollama};
pub use error::{Error, FailureKind, Result};
pub use markdown::{MarkdownAccumulator, RenderFormat, render_markdown};
pub use observability::register_biometrics;
pub use render::{LogChannelSink, PanelCommand, PanelMessage, PanelSink, RenderSink, TerminalSink};
pub use source::{ChunkSource, FragmentStream, ScriptedSource};
pub use turn_logger::{JsonLinesLogger, TurnLogger};
pub use types::*;
