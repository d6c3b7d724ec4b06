//! Render sinks: the presentation side of a turn.
//!
//! A [`RenderSink`] has one handler per [`RenderEvent`] variant and applies each event
//! blindly; the phase logic lives entirely in the aggregator.  Three sinks are provided: a
//! terminal writer, an append-only log channel, and a panel bridge that posts one message
//! per event across a process boundary.

use std::io::{self, Stdout, Write};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::RenderEvent;

/// ANSI escape code for dim text (used for reasoning).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for reasoning).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for red text (used for failures).
const ANSI_RED: &str = "\x1b[31m";

const RESPONSE_HEADER: &str = "Response:";
const RESPONSE_RULE: &str = "========";

/// Applies render events to some presentation surface.
///
/// A sink is a single-writer target: only the event stream of the active turn writes to it.
pub trait RenderSink: Send {
    /// Reasoning text is about to be shown for the first time this turn.
    fn on_thinking_started(&mut self);

    /// The reasoning text to date.  Not a delta.
    fn on_thinking_updated(&mut self, text: &str);

    /// Answer text is about to be shown for the first time this turn.
    fn on_response_started(&mut self);

    /// The fully rendered answer to date.  Replaces whatever was shown before.
    fn on_response_updated(&mut self, text: &str);

    /// The turn ended with an error.
    fn on_failed(&mut self, message: &str);

    /// The turn ended normally.
    fn on_completed(&mut self);

    /// The turn was abandoned before it reached a terminal event.
    fn on_canceled(&mut self) {}
}

impl RenderEvent {
    /// Invokes the handler on `sink` that corresponds to this event.
    pub fn dispatch(&self, sink: &mut dyn RenderSink) {
        match self {
            RenderEvent::ThinkingStarted => sink.on_thinking_started(),
            RenderEvent::ThinkingUpdated(text) => sink.on_thinking_updated(text),
            RenderEvent::ResponseStarted => sink.on_response_started(),
            RenderEvent::ResponseUpdated(text) => sink.on_response_updated(text),
            RenderEvent::TurnFailed(message) => sink.on_failed(message),
            RenderEvent::TurnCompleted => sink.on_completed(),
        }
    }
}

//////////////////////////////////////////// Transcript ////////////////////////////////////////////

/// Append-only transcript shared by the terminal and log-channel sinks.
///
/// Events carry text-to-date, but an append-only surface can only add.  When the new text
/// extends what was written, only the suffix is written; otherwise the text is rewritten
/// on a fresh line.
struct Transcript<W: Write> {
    out: W,
    use_color: bool,
    in_thinking: bool,
    in_answer: bool,
    reasoning_shown: String,
    answer_shown: String,
    error: Option<io::Error>,
}

impl<W: Write> Transcript<W> {
    fn new(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            in_thinking: false,
            in_answer: false,
            reasoning_shown: String::new(),
            answer_shown: String::new(),
            error: None,
        }
    }

    /// Writes `text`, stopping at the first write error and keeping it.
    fn write(&mut self, text: &str) {
        if self.error.is_some() {
            return;
        }
        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(err) = result {
            self.error = Some(err);
        }
    }

    fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    fn reset_thinking(&mut self) {
        if self.in_thinking {
            if self.use_color {
                self.write(ANSI_RESET);
            }
            self.in_thinking = false;
        }
    }

    fn end_turn(&mut self) {
        self.reasoning_shown.clear();
        self.answer_shown.clear();
        self.in_thinking = false;
        self.in_answer = false;
    }

    /// Opens a reasoning block, on a fresh line when answer text was written last.
    fn open_thinking(&mut self, marker: bool) {
        if self.in_answer {
            self.write("\n");
            self.in_answer = false;
        }
        if self.use_color {
            self.write(ANSI_DIM);
            self.write(ANSI_ITALIC);
        } else if marker {
            self.write("[thinking] ");
        }
        self.in_thinking = true;
    }

    fn thinking_started(&mut self) {
        self.open_thinking(true);
    }

    fn thinking_updated(&mut self, text: &str) {
        if !self.in_thinking {
            self.open_thinking(self.in_answer);
        }
        let shown = std::mem::take(&mut self.reasoning_shown);
        self.write_extension(&shown, text);
        self.reasoning_shown = text.to_string();
    }

    fn response_started(&mut self) {
        self.reset_thinking();
        self.answer_shown.clear();
        self.write(&format!("\n{RESPONSE_HEADER}\n{RESPONSE_RULE}\n"));
        self.in_answer = true;
    }

    fn response_updated(&mut self, text: &str) {
        if self.in_thinking {
            self.reset_thinking();
            self.write("\n");
        }
        self.in_answer = true;
        let shown = std::mem::take(&mut self.answer_shown);
        self.write_extension(&shown, text);
        self.answer_shown = text.to_string();
    }

    fn write_extension(&mut self, shown: &str, text: &str) {
        match text.strip_prefix(shown) {
            Some(suffix) => self.write(suffix),
            None => {
                self.write("\n");
                self.write(text);
            }
        }
    }

    fn finish(&mut self) {
        self.reset_thinking();
        self.write("\n");
    }

    fn interrupted(&mut self) {
        self.reset_thinking();
        self.write("\n[interrupted]\n");
    }

    fn error_line(&self, message: &str) -> String {
        if self.use_color {
            format!("\n{ANSI_RED}Error: {message}{ANSI_RESET}\n")
        } else {
            format!("\nError: {message}\n")
        }
    }
}

///////////////////////////////////////////// Terminal /////////////////////////////////////////////

/// Writes a turn to standard output, with failures on standard error.
///
/// Reasoning is shown dim and italic when color is enabled.
pub struct TerminalSink {
    transcript: Transcript<Stdout>,
}

impl TerminalSink {
    /// Creates a terminal sink with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a terminal sink with the specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            transcript: Transcript::new(io::stdout(), use_color),
        }
    }

    /// Prints an informational line outside of any turn.
    pub fn print_info(&mut self, info: &str) {
        self.transcript.reset_thinking();
        self.transcript.write(info);
        self.transcript.write("\n");
    }

    /// Prints an error outside of any turn.
    pub fn print_error(&mut self, error: &str) {
        self.transcript.reset_thinking();
        eprint!("{}", self.transcript.error_line(error));
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSink for TerminalSink {
    fn on_thinking_started(&mut self) {
        self.transcript.thinking_started();
    }

    fn on_thinking_updated(&mut self, text: &str) {
        self.transcript.thinking_updated(text);
    }

    fn on_response_started(&mut self) {
        self.transcript.response_started();
    }

    fn on_response_updated(&mut self, text: &str) {
        self.transcript.response_updated(text);
    }

    fn on_failed(&mut self, message: &str) {
        self.transcript.reset_thinking();
        eprint!("{}", self.transcript.error_line(message));
        self.transcript.end_turn();
    }

    fn on_completed(&mut self) {
        self.transcript.finish();
        self.transcript.end_turn();
    }

    fn on_canceled(&mut self) {
        self.transcript.interrupted();
        self.transcript.end_turn();
    }
}

//////////////////////////////////////////// Log channel ///////////////////////////////////////////

/// Writes a turn to an append-only log.
///
/// Uses the same separator convention as the terminal but never emits escape codes, and
/// failures are written inline.
pub struct LogChannelSink<W: Write + Send> {
    transcript: Transcript<W>,
}

impl<W: Write + Send> LogChannelSink<W> {
    /// Creates a sink appending to `out`.
    pub fn new(out: W) -> Self {
        Self {
            transcript: Transcript::new(out, false),
        }
    }

    /// Appends a line outside of any turn, such as the user's prompt.
    pub fn append_line(&mut self, line: &str) {
        self.transcript.write(line);
        self.transcript.write("\n");
    }

    /// Returns the first error hit while writing to the log, if any.
    ///
    /// Once a write fails nothing more is written, so a `Some` here means the log is
    /// incomplete.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.transcript.take_error()
    }

    /// Consumes the sink and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.transcript.out
    }
}

impl<W: Write + Send> RenderSink for LogChannelSink<W> {
    fn on_thinking_started(&mut self) {
        self.transcript.thinking_started();
    }

    fn on_thinking_updated(&mut self, text: &str) {
        self.transcript.thinking_updated(text);
    }

    fn on_response_started(&mut self) {
        self.transcript.response_started();
    }

    fn on_response_updated(&mut self, text: &str) {
        self.transcript.response_updated(text);
    }

    fn on_failed(&mut self, message: &str) {
        let line = self.transcript.error_line(message);
        self.transcript.write(&line);
        self.transcript.end_turn();
    }

    fn on_completed(&mut self) {
        self.transcript.finish();
        self.transcript.end_turn();
    }

    fn on_canceled(&mut self) {
        self.transcript.interrupted();
        self.transcript.end_turn();
    }
}

/////////////////////////////////////////////// Panel //////////////////////////////////////////////

/// The command names understood by the panel's presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PanelCommand {
    /// Open a reasoning block.
    Thinking,
    /// Replace the reasoning block's text.
    UpdateThinking,
    /// Open the answer block.
    StartResponse,
    /// Replace the answer block's markup.
    AppendResponse,
    /// Append a visually distinct error block.
    Error,
}

/// One message posted to the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelMessage {
    /// What the panel should do.
    pub command: PanelCommand,
    /// The text or markup the command applies, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<String>,
}

impl PanelMessage {
    fn bare(command: PanelCommand) -> Self {
        Self {
            command,
            text: None,
        }
    }

    fn with_text(command: PanelCommand, text: &str) -> Self {
        Self {
            command,
            text: Some(text.to_string()),
        }
    }
}

/// Posts one [`PanelMessage`] per event onto a channel.
///
/// The answer text should already be rendered to HTML; the turn feeding this sink is
/// expected to use [`crate::RenderFormat::Html`].  Completion posts nothing: the panel
/// treats the absence of further messages as the end of the turn.
pub struct PanelSink {
    tx: UnboundedSender<PanelMessage>,
}

impl PanelSink {
    /// Creates a sink posting onto `tx`.
    pub fn new(tx: UnboundedSender<PanelMessage>) -> Self {
        Self { tx }
    }

    fn post(&self, message: PanelMessage) {
        // A closed channel means the panel went away; nothing is left to draw on.
        let _ = self.tx.send(message);
    }
}

impl RenderSink for PanelSink {
    fn on_thinking_started(&mut self) {
        self.post(PanelMessage::bare(PanelCommand::Thinking));
    }

    fn on_thinking_updated(&mut self, text: &str) {
        self.post(PanelMessage::with_text(PanelCommand::UpdateThinking, text));
    }

    fn on_response_started(&mut self) {
        self.post(PanelMessage::bare(PanelCommand::StartResponse));
    }

    fn on_response_updated(&mut self, text: &str) {
        self.post(PanelMessage::with_text(PanelCommand::AppendResponse, text));
    }

    fn on_failed(&mut self, message: &str) {
        self.post(PanelMessage::with_text(PanelCommand::Error, message));
    }

    fn on_completed(&mut self) {}
}
