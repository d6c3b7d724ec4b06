//! Progressive re-rendering of streamed answer text.
//!
//! Partial markdown changes meaning as more text arrives (an unterminated `*` becomes
//! emphasis, an open code fence swallows everything after it), so the display form is
//! always recomputed from the complete raw text.  Callers replace what they showed before
//! on every update; they never append to previously rendered markup.

use std::fmt;
use std::str::FromStr;

use pulldown_cmark::{Event, Options, Parser, html};

/// The display form produced for answer text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderFormat {
    /// The raw text, unchanged.
    #[default]
    PlainText,
    /// CommonMark rendered to an HTML fragment.
    Html,
}

impl fmt::Display for RenderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderFormat::PlainText => write!(f, "text"),
            RenderFormat::Html => write!(f, "html"),
        }
    }
}

impl FromStr for RenderFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(RenderFormat::PlainText),
            "html" => Ok(RenderFormat::Html),
            _ => Err(format!(
                "Invalid render format: {s}. Valid options: text, html"
            )),
        }
    }
}

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Render the complete raw answer text into its display form.
///
/// Deterministic and free of side effects; the cost is linear in the length of `raw`.
pub fn render_markdown(raw: &str, format: RenderFormat) -> String {
    match format {
        RenderFormat::PlainText => raw.to_string(),
        RenderFormat::Html => {
            // Raw HTML in model output is shown as text, never passed through as markup.
            let parser = Parser::new_ext(raw, markdown_options()).map(|event| match event {
                Event::Html(text) | Event::InlineHtml(text) => Event::Text(text),
                event => event,
            });
            let mut out = String::with_capacity(raw.len() + raw.len() / 2);
            html::push_html(&mut out, parser);
            out
        }
    }
}

/// Raw answer text for the current turn plus the format it is displayed in.
#[derive(Debug, Clone, Default)]
pub struct MarkdownAccumulator {
    raw: String,
    format: RenderFormat,
}

impl MarkdownAccumulator {
    /// Creates an empty accumulator.
    pub fn new(format: RenderFormat) -> Self {
        Self {
            raw: String::new(),
            format,
        }
    }

    /// Appends a slice of answer text and returns the re-rendered whole.
    pub fn push(&mut self, delta: &str) -> String {
        self.raw.push_str(delta);
        self.rendered()
    }

    /// Returns the display form of everything accumulated so far.
    pub fn rendered(&self) -> String {
        render_markdown(&self.raw, self.format)
    }

    /// Returns the raw text accumulated so far.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the display format.
    pub fn format(&self) -> RenderFormat {
        self.format
    }

    /// Returns true if no answer text has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}
