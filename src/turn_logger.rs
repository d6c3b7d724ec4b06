//! Logging trait for turn processing.
//!
//! This module provides the [`TurnLogger`] trait that lets a front end capture every
//! fragment the aggregator consumes and every render event it emits, plus
//! [`JsonLinesLogger`], which records them as one JSON object per line.

use std::io::Write;
use std::sync::Mutex;

use serde_json::json;

use crate::{Error, Fragment, RenderEvent};

/// A trait for logging turn processing.
///
/// Loggers observe; they never influence what is rendered.
///
/// # Example
///
/// ```rust,ignore
/// use convocode::{Fragment, RenderEvent, TurnLogger};
///
/// struct StderrLogger;
///
/// impl TurnLogger for StderrLogger {
///     fn log_fragment(&self, fragment: &Fragment) {
///         eprintln!("fragment: {fragment:?}");
///     }
///
///     fn log_event(&self, event: &RenderEvent) {
///         eprintln!("event: {event:?}");
///     }
/// }
/// ```
pub trait TurnLogger: Send + Sync {
    /// Log a fragment as it is received from the chunk source.
    fn log_fragment(&self, fragment: &Fragment);

    /// Log a render event as it is emitted.
    fn log_event(&self, event: &RenderEvent);

    /// Log the error that ended a turn.
    fn log_failure(&self, error: &Error) {
        _ = error;
    }

    /// Log that a turn was abandoned before reaching a terminal event.
    fn log_canceled(&self) {}
}

/// Writes one JSON object per line for every logged record.
pub struct JsonLinesLogger<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesLogger<W> {
    /// Creates a logger that appends to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the logger and returns the underlying writer.
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_record(&self, record: serde_json::Value) {
        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = writeln!(writer, "{record}");
        let _ = writer.flush();
    }
}

impl<W: Write + Send> TurnLogger for JsonLinesLogger<W> {
    fn log_fragment(&self, fragment: &Fragment) {
        self.write_record(json!({ "kind": "fragment", "fragment": fragment }));
    }

    fn log_event(&self, event: &RenderEvent) {
        self.write_record(json!({ "kind": "event", "event": event }));
    }

    fn log_failure(&self, error: &Error) {
        self.write_record(json!({
            "kind": "failure",
            "failure": format!("{:?}", error.failure_kind()),
            "message": error.to_string(),
        }));
    }

    fn log_canceled(&self) {
        self.write_record(json!({ "kind": "canceled" }));
    }
}
