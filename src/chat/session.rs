//! Turn ownership for a conversation.
//!
//! A [`ChatSession`] turns user submissions into [`Turn`]s.  At most one turn is active at
//! a time: starting a new one cancels whatever was in flight, so two turns never write to
//! the same sink at once.

use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::aggregator::{ReasoningUpdates, TurnAggregator};
use crate::chat::config::ChatConfig;
use crate::error::{Error, Result};
use crate::markdown::RenderFormat;
use crate::render::RenderSink;
use crate::source::{ChunkSource, FragmentStream};
use crate::turn_logger::TurnLogger;
use crate::{ChatRequest, RenderEvent};

type EventStream = Pin<Box<dyn Stream<Item = RenderEvent> + Send>>;

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The source was exhausted normally.
    Completed,
    /// The turn failed with the given message.
    Failed(String),
    /// The turn was abandoned before reaching a terminal event.
    Canceled,
}

/// A clonable handle that cancels whichever turn is active.
///
/// Safe to use from signal handlers and other tasks.
#[derive(Clone, Default)]
pub struct TurnCanceler {
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl TurnCanceler {
    /// Cancels the active turn.  Returns true if there was one to cancel.
    pub fn cancel(&self) -> bool {
        match self.replace(None) {
            Some(token) => {
                let live = !token.is_cancelled();
                token.cancel();
                live
            }
            None => false,
        }
    }

    fn replace(&self, token: Option<CancellationToken>) -> Option<CancellationToken> {
        let mut active = match self.active.lock() {
            Ok(active) => active,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *active, token)
    }
}

/// One user submission and its streamed response.
///
/// A turn owns its event stream and cancellation token.  Dropping a turn releases the
/// underlying source.
pub struct Turn {
    prompt: String,
    events: EventStream,
    cancel: CancellationToken,
}

impl Turn {
    /// Returns the trimmed text the user submitted.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Abandons the turn.  No terminal event will follow.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns a token that cancels this turn.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns the next render event, or `None` once the turn is over.
    pub async fn next_event(&mut self) -> Option<RenderEvent> {
        self.events.next().await
    }

    /// Applies every event of this turn to `sink` in emission order.
    ///
    /// A turn that ends without a terminal event was canceled; the sink is told so through
    /// [`RenderSink::on_canceled`].
    pub async fn run(mut self, sink: &mut dyn RenderSink) -> TurnOutcome {
        let mut outcome = None;
        while let Some(event) = self.next_event().await {
            event.dispatch(sink);
            match event {
                RenderEvent::TurnCompleted => outcome = Some(TurnOutcome::Completed),
                RenderEvent::TurnFailed(message) => outcome = Some(TurnOutcome::Failed(message)),
                _ => {}
            }
        }
        match outcome {
            Some(outcome) => outcome,
            None => {
                sink.on_canceled();
                TurnOutcome::Canceled
            }
        }
    }
}

/// A conversation with one chunk source.
///
/// No history is carried between turns; every turn sends exactly one user message.
pub struct ChatSession {
    source: Arc<dyn ChunkSource>,
    config: ChatConfig,
    format: RenderFormat,
    logger: Option<Arc<dyn TurnLogger>>,
    canceler: TurnCanceler,
}

impl ChatSession {
    /// Creates a session that opens turns against `source`.
    pub fn new(source: Arc<dyn ChunkSource>, config: ChatConfig) -> Self {
        Self {
            source,
            config,
            format: RenderFormat::default(),
            logger: None,
            canceler: TurnCanceler::default(),
        }
    }

    /// Sets the display form for answer text.
    pub fn with_format(mut self, format: RenderFormat) -> Self {
        self.format = format;
        self
    }

    /// Attaches a logger to every turn this session starts.
    pub fn with_logger(mut self, logger: Arc<dyn TurnLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the model used for new turns.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Changes the model used for new turns.
    pub fn set_model(&mut self, model: impl Into<String>) -> Result<()> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(Error::validation(
                "model must not be empty",
                Some("model".to_string()),
            ));
        }
        self.config.model = model;
        Ok(())
    }

    /// Returns the configured selectable models.
    pub fn models(&self) -> &[String] {
        &self.config.models
    }

    /// Chooses which reasoning updates new turns surface.
    pub fn set_reasoning_updates(&mut self, reasoning_updates: ReasoningUpdates) {
        self.config.reasoning_updates = reasoning_updates;
    }

    /// Chooses whether new turns ask the model to reason.
    pub fn set_think(&mut self, think: Option<bool>) {
        self.config.think = think;
    }

    /// Returns a handle that cancels whichever turn is active.
    pub fn canceler(&self) -> TurnCanceler {
        self.canceler.clone()
    }

    /// Cancels the active turn, if any.
    pub fn cancel_active(&self) -> bool {
        self.canceler.cancel()
    }

    /// Starts a turn for `input`.
    ///
    /// Returns `Ok(None)` when the trimmed input is empty; no turn is created.  Any turn still
    /// in flight is canceled first.  A source that cannot be opened produces a turn whose only
    /// event is `TurnFailed`.
    pub async fn start_turn(&mut self, input: &str) -> Result<Option<Turn>> {
        let prompt = input.trim();
        if prompt.is_empty() {
            return Ok(None);
        }

        let cancel = CancellationToken::new();
        if let Some(previous) = self.canceler.replace(Some(cancel.clone())) {
            previous.cancel();
        }

        let mut aggregator = TurnAggregator::new(self.format)
            .with_reasoning_updates(self.config.reasoning_updates);
        if let Some(logger) = &self.logger {
            aggregator = aggregator.with_logger(Arc::clone(logger));
        }

        let request =
            ChatRequest::for_prompt(self.config.model.clone(), prompt).with_think(self.config.think);
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            opened = self.source.open(request) => Some(opened),
        };
        let fragments: FragmentStream = match opened {
            Some(Ok(fragments)) => fragments,
            Some(Err(err)) => Box::pin(stream::iter(vec![Err(err)])),
            None => Box::pin(stream::empty()),
        };

        Ok(Some(Turn {
            prompt: prompt.to_string(),
            events: Box::pin(aggregator.drive(fragments, cancel.clone())),
            cancel,
        }))
    }
}
