//! Shared plumbing for the convocode front ends.
//!
//! - [`config`]: CLI argument parsing and layered configuration
//! - [`session`]: turn ownership and cancellation
//! - [`commands`]: slash command parsing for the terminal REPL

mod commands;
mod config;
mod session;

pub use crate::render::{LogChannelSink, PanelCommand, PanelMessage, PanelSink, RenderSink, TerminalSink};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{BASE_URL_ENV, ChatArgs, ChatConfig, DEFAULT_MODEL, FileConfig, MODEL_ENV};
pub use session::{ChatSession, Turn, TurnCanceler, TurnOutcome};
