//! The streaming turn aggregator.
//!
//! A [`TurnAggregator`] consumes the fragments of exactly one turn and converts them into
//! an ordered sequence of [`RenderEvent`]s that a sink can apply blindly.  The synchronous
//! core ([`TurnAggregator::apply`], [`TurnAggregator::complete`], [`TurnAggregator::fail`])
//! holds all of the phase logic; [`TurnAggregator::drive`] wraps it around an asynchronous
//! fragment source with cancellation.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::markdown::{MarkdownAccumulator, RenderFormat};
use crate::observability::{
    TURN_DURATION, TURN_FIRST_FRAGMENT, TURN_FRAGMENTS, TURN_KEEP_ALIVES, TURNS_CANCELED,
    TURNS_COMPLETED, TURNS_FAILED, TURNS_STARTED,
};
use crate::source::FragmentStream;
use crate::turn_logger::TurnLogger;
use crate::{Error, Fragment, RenderEvent, TurnPhase};

/// Which reasoning fragments are surfaced as `ThinkingUpdated` events.
///
/// The chunk source delivers reasoning as cumulative-to-date text.  Some front ends redraw
/// it on every fragment; others only ever show the first non-empty reasoning fragment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReasoningUpdates {
    /// Emit `ThinkingUpdated` for every non-empty reasoning fragment.
    #[default]
    Continuous,
    /// Emit `ThinkingUpdated` only for the first non-empty reasoning fragment.
    FirstOnly,
}

impl fmt::Display for ReasoningUpdates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReasoningUpdates::Continuous => write!(f, "continuous"),
            ReasoningUpdates::FirstOnly => write!(f, "first"),
        }
    }
}

impl FromStr for ReasoningUpdates {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "continuous" | "all" => Ok(ReasoningUpdates::Continuous),
            "first" | "first-only" | "first_only" => Ok(ReasoningUpdates::FirstOnly),
            _ => Err(format!(
                "Invalid reasoning mode: {s}. Valid options: continuous, first"
            )),
        }
    }
}

/// Lifecycle state of one turn.
#[derive(Debug)]
struct TurnState {
    phase: TurnPhase,
    answer: MarkdownAccumulator,
    reasoning_started: bool,
    answer_started: bool,
}

impl TurnState {
    fn new(format: RenderFormat) -> Self {
        Self {
            phase: TurnPhase::Idle,
            answer: MarkdownAccumulator::new(format),
            reasoning_started: false,
            answer_started: false,
        }
    }
}

/// Drives one turn's fragments to a well-ordered sequence of render events.
///
/// An aggregator handles exactly one turn.  A new submission constructs a new aggregator.
pub struct TurnAggregator {
    state: TurnState,
    reasoning_updates: ReasoningUpdates,
    logger: Option<Arc<dyn TurnLogger>>,
    started_at: Instant,
    saw_fragment: bool,
    canceled: bool,
}

impl TurnAggregator {
    /// Creates an aggregator whose answer text is rendered in `format`.
    pub fn new(format: RenderFormat) -> Self {
        TURNS_STARTED.click();
        Self {
            state: TurnState::new(format),
            reasoning_updates: ReasoningUpdates::default(),
            logger: None,
            started_at: Instant::now(),
            saw_fragment: false,
            canceled: false,
        }
    }

    /// Selects which reasoning fragments are surfaced.
    pub fn with_reasoning_updates(mut self, reasoning_updates: ReasoningUpdates) -> Self {
        self.reasoning_updates = reasoning_updates;
        self
    }

    /// Attaches a logger that observes fragments and events.
    pub fn with_logger(mut self, logger: Arc<dyn TurnLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Returns the current phase.
    pub fn phase(&self) -> TurnPhase {
        self.state.phase
    }

    /// Returns the raw answer text accumulated so far.
    pub fn raw_answer(&self) -> &str {
        self.state.answer.raw()
    }

    /// Returns true once any reasoning text has been seen.
    pub fn reasoning_started(&self) -> bool {
        self.state.reasoning_started
    }

    /// Returns true once any answer text has been seen.
    pub fn answer_started(&self) -> bool {
        self.state.answer_started
    }

    /// Consumes one fragment and returns the events it produces, in order.
    ///
    /// Keep-alive fragments produce nothing.  Fragments that arrive after the turn reached a
    /// terminal phase are ignored.
    pub fn apply(&mut self, fragment: &Fragment) -> Vec<RenderEvent> {
        if self.state.phase.is_terminal() {
            return Vec::new();
        }
        if !self.saw_fragment {
            self.saw_fragment = true;
            TURN_FIRST_FRAGMENT.add(self.started_at.elapsed().as_secs_f64());
        }
        TURN_FRAGMENTS.click();
        if let Some(logger) = &self.logger {
            logger.log_fragment(fragment);
        }

        let mut events = Vec::new();
        if let Some(reasoning) = fragment.reasoning_text() {
            if !self.state.reasoning_started {
                self.state.reasoning_started = true;
                events.push(RenderEvent::ThinkingStarted);
                events.push(RenderEvent::ThinkingUpdated(reasoning.to_string()));
            } else if self.reasoning_updates == ReasoningUpdates::Continuous {
                events.push(RenderEvent::ThinkingUpdated(reasoning.to_string()));
            }
            self.state.phase = TurnPhase::Reasoning;
        }
        if let Some(answer) = fragment.answer_text() {
            if !self.state.answer_started {
                self.state.answer_started = true;
                events.push(RenderEvent::ResponseStarted);
            }
            let rendered = self.state.answer.push(answer);
            events.push(RenderEvent::ResponseUpdated(rendered));
            self.state.phase = TurnPhase::Answering;
        }

        if fragment.is_keep_alive() {
            TURN_KEEP_ALIVES.click();
        }
        self.log_events(&events);
        events
    }

    /// Marks the source as exhausted and returns `TurnCompleted`.
    ///
    /// Returns `None` if the turn already ended.
    pub fn complete(&mut self) -> Option<RenderEvent> {
        if self.state.phase.is_terminal() {
            return None;
        }
        self.state.phase = TurnPhase::Done;
        TURNS_COMPLETED.click();
        TURN_DURATION.add(self.started_at.elapsed().as_secs_f64());
        let event = RenderEvent::TurnCompleted;
        self.log_events(std::slice::from_ref(&event));
        Some(event)
    }

    /// Marks the source as failed and returns `TurnFailed` carrying the error message.
    ///
    /// Returns `None` if the turn already ended.  Content already rendered stays visible;
    /// nothing is rolled back.
    pub fn fail(&mut self, error: &Error) -> Option<RenderEvent> {
        if self.state.phase.is_terminal() {
            return None;
        }
        self.state.phase = TurnPhase::Failed;
        TURNS_FAILED.click();
        TURN_DURATION.add(self.started_at.elapsed().as_secs_f64());
        if let Some(logger) = &self.logger {
            logger.log_failure(error);
        }
        let event = RenderEvent::TurnFailed(error.to_string());
        self.log_events(std::slice::from_ref(&event));
        Some(event)
    }

    /// Records that the turn was abandoned.  No event is produced.
    pub fn cancel(&mut self) {
        if self.canceled || self.state.phase.is_terminal() {
            return;
        }
        self.canceled = true;
        TURNS_CANCELED.click();
        if let Some(logger) = &self.logger {
            logger.log_canceled();
        }
    }

    /// Drives `source` to completion, yielding render events lazily.
    ///
    /// The stream ends after `TurnCompleted` or `TurnFailed`.  Cancelling `cancel`, or simply
    /// dropping the returned stream, stops consuming the source immediately and releases it;
    /// no terminal event is produced for a canceled turn.
    pub fn drive(
        self,
        source: FragmentStream,
        cancel: CancellationToken,
    ) -> impl Stream<Item = RenderEvent> + Send {
        let driver = Driver {
            aggregator: self,
            source,
            cancel,
            pending: VecDeque::new(),
            finished: false,
        };
        stream::unfold(driver, |mut driver| async move {
            loop {
                if driver.cancel.is_cancelled() {
                    driver.aggregator.cancel();
                    return None;
                }
                if let Some(event) = driver.pending.pop_front() {
                    return Some((event, driver));
                }
                if driver.finished {
                    return None;
                }

                let next = tokio::select! {
                    biased;
                    _ = driver.cancel.cancelled() => None,
                    item = driver.source.next() => Some(item),
                };
                match next {
                    None => {
                        driver.aggregator.cancel();
                        return None;
                    }
                    Some(Some(Ok(fragment))) => {
                        let events = driver.aggregator.apply(&fragment);
                        driver.pending.extend(events);
                    }
                    Some(Some(Err(err))) => {
                        driver.finished = true;
                        driver.pending.extend(driver.aggregator.fail(&err));
                    }
                    Some(None) => {
                        driver.finished = true;
                        driver.pending.extend(driver.aggregator.complete());
                    }
                }
            }
        })
    }

    fn log_events(&self, events: &[RenderEvent]) {
        if let Some(logger) = &self.logger {
            for event in events {
                logger.log_event(event);
            }
        }
    }
}

struct Driver {
    aggregator: TurnAggregator,
    source: FragmentStream,
    cancel: CancellationToken,
    pending: VecDeque<RenderEvent>,
    finished: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn_logger::JsonLinesLogger;
    use futures::stream;
    use std::sync::Mutex;

    fn plain() -> TurnAggregator {
        TurnAggregator::new(RenderFormat::PlainText)
    }

    fn apply_all(aggregator: &mut TurnAggregator, fragments: &[Fragment]) -> Vec<RenderEvent> {
        fragments.iter().flat_map(|f| aggregator.apply(f)).collect()
    }

    #[test]
    fn reasoning_then_answer() {
        let mut aggregator = plain();
        let mut events = apply_all(
            &mut aggregator,
            &[
                Fragment::reasoning("Let"),
                Fragment::reasoning("Let me think"),
                Fragment::answer("Hi"),
                Fragment::answer(" there"),
            ],
        );
        events.extend(aggregator.complete());
        assert_eq!(
            events,
            vec![
                RenderEvent::ThinkingStarted,
                RenderEvent::ThinkingUpdated("Let".to_string()),
                RenderEvent::ThinkingUpdated("Let me think".to_string()),
                RenderEvent::ResponseStarted,
                RenderEvent::ResponseUpdated("Hi".to_string()),
                RenderEvent::ResponseUpdated("Hi there".to_string()),
                RenderEvent::TurnCompleted,
            ]
        );
        assert_eq!(aggregator.phase(), TurnPhase::Done);
    }

    #[test]
    fn first_only_reasoning() {
        let mut aggregator = plain().with_reasoning_updates(ReasoningUpdates::FirstOnly);
        let events = apply_all(
            &mut aggregator,
            &[
                Fragment::reasoning("Let"),
                Fragment::reasoning("Let me think"),
                Fragment::answer("Hi"),
            ],
        );
        assert_eq!(
            events,
            vec![
                RenderEvent::ThinkingStarted,
                RenderEvent::ThinkingUpdated("Let".to_string()),
                RenderEvent::ResponseStarted,
                RenderEvent::ResponseUpdated("Hi".to_string()),
            ]
        );
        assert_eq!(aggregator.phase(), TurnPhase::Answering);
    }

    #[test]
    fn answer_before_reasoning() {
        let mut aggregator = plain();
        let events = apply_all(
            &mut aggregator,
            &[Fragment::answer("A"), Fragment::reasoning("r"), Fragment::answer("B")],
        );
        assert_eq!(
            events,
            vec![
                RenderEvent::ResponseStarted,
                RenderEvent::ResponseUpdated("A".to_string()),
                RenderEvent::ThinkingStarted,
                RenderEvent::ThinkingUpdated("r".to_string()),
                RenderEvent::ResponseUpdated("AB".to_string()),
            ]
        );
        assert_eq!(aggregator.raw_answer(), "AB");
    }

    #[test]
    fn both_fields_in_one_fragment() {
        let mut aggregator = plain();
        let events = aggregator.apply(&Fragment::both("think", "say"));
        assert_eq!(
            events,
            vec![
                RenderEvent::ThinkingStarted,
                RenderEvent::ThinkingUpdated("think".to_string()),
                RenderEvent::ResponseStarted,
                RenderEvent::ResponseUpdated("say".to_string()),
            ]
        );
    }

    #[test]
    fn keep_alive_is_silent() {
        let mut aggregator = plain();
        assert!(aggregator.apply(&Fragment::keep_alive()).is_empty());
        assert!(
            aggregator
                .apply(&Fragment {
                    reasoning: Some(String::new()),
                    answer: Some(String::new()),
                })
                .is_empty()
        );
        assert_eq!(aggregator.phase(), TurnPhase::Idle);
        assert!(!aggregator.reasoning_started());
        assert!(!aggregator.answer_started());
    }

    #[test]
    fn terminal_is_final() {
        let mut aggregator = plain();
        aggregator.apply(&Fragment::answer("X"));
        assert_eq!(
            aggregator.fail(&Error::streaming("reset", None)),
            Some(RenderEvent::TurnFailed("Streaming error: reset".to_string()))
        );
        assert_eq!(aggregator.phase(), TurnPhase::Failed);
        assert!(aggregator.apply(&Fragment::answer("Y")).is_empty());
        assert_eq!(aggregator.complete(), None);
        assert_eq!(aggregator.fail(&Error::streaming("again", None)), None);
        assert_eq!(aggregator.raw_answer(), "X");
    }

    #[test]
    fn html_answers_are_rerendered() {
        let mut aggregator = TurnAggregator::new(RenderFormat::Html);
        let events = apply_all(&mut aggregator, &[Fragment::answer("*a"), Fragment::answer("*")]);
        assert_eq!(
            events.last(),
            Some(&RenderEvent::ResponseUpdated("<p><em>a</em></p>\n".to_string()))
        );
    }

    #[test]
    fn parse_reasoning_updates() {
        assert_eq!(
            "first".parse::<ReasoningUpdates>().unwrap(),
            ReasoningUpdates::FirstOnly
        );
        assert_eq!(
            "Continuous".parse::<ReasoningUpdates>().unwrap(),
            ReasoningUpdates::Continuous
        );
        assert!("sometimes".parse::<ReasoningUpdates>().is_err());
    }

    fn source_of(items: Vec<crate::Result<Fragment>>) -> FragmentStream {
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn drive_empty_source() {
        let events: Vec<_> = plain()
            .drive(source_of(vec![]), CancellationToken::new())
            .collect()
            .await;
        assert_eq!(events, vec![RenderEvent::TurnCompleted]);
    }

    #[tokio::test]
    async fn drive_reasoning_only() {
        let events: Vec<_> = plain()
            .drive(
                source_of(vec![Ok(Fragment::reasoning("hmm")), Ok(Fragment::keep_alive())]),
                CancellationToken::new(),
            )
            .collect()
            .await;
        assert_eq!(
            events,
            vec![
                RenderEvent::ThinkingStarted,
                RenderEvent::ThinkingUpdated("hmm".to_string()),
                RenderEvent::TurnCompleted,
            ]
        );
    }

    #[tokio::test]
    async fn drive_stops_at_first_error() {
        let events: Vec<_> = plain()
            .drive(
                source_of(vec![
                    Ok(Fragment::answer("X")),
                    Err(Error::streaming("connection reset", None)),
                    Ok(Fragment::answer("never")),
                ]),
                CancellationToken::new(),
            )
            .collect()
            .await;
        assert_eq!(
            events,
            vec![
                RenderEvent::ResponseStarted,
                RenderEvent::ResponseUpdated("X".to_string()),
                RenderEvent::TurnFailed("Streaming error: connection reset".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn cancel_while_waiting_for_source() {
        let cancel = CancellationToken::new();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<crate::Result<Fragment>>();
        let source: FragmentStream = Box::pin(tokio_stream_from(rx));
        let mut events = Box::pin(plain().drive(source, cancel.clone()));

        tx.send(Ok(Fragment::answer("Hi"))).unwrap();
        assert_eq!(events.next().await, Some(RenderEvent::ResponseStarted));
        assert_eq!(
            events.next().await,
            Some(RenderEvent::ResponseUpdated("Hi".to_string()))
        );

        cancel.cancel();
        assert_eq!(events.next().await, None);
        // The source was dropped with the driver, so the sender sees a closed channel.
        assert!(tx.send(Ok(Fragment::answer("late"))).is_err());
    }

    #[tokio::test]
    async fn cancel_discards_pending_events() {
        let cancel = CancellationToken::new();
        let mut events = Box::pin(plain().drive(
            source_of(vec![Ok(Fragment::both("r", "a"))]),
            cancel.clone(),
        ));
        assert_eq!(events.next().await, Some(RenderEvent::ThinkingStarted));
        cancel.cancel();
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn logger_sees_fragments_and_events() {
        struct Shared(Arc<Mutex<Vec<u8>>>);
        impl std::io::Write for Shared {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let logger = Arc::new(JsonLinesLogger::new(Shared(Arc::clone(&buffer))));
        let _: Vec<_> = plain()
            .with_logger(logger)
            .drive(
                source_of(vec![Ok(Fragment::answer("Hi"))]),
                CancellationToken::new(),
            )
            .collect()
            .await;

        let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        let kinds: Vec<String> = output
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["kind"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(kinds, vec!["fragment", "event", "event", "event"]);
    }

    fn tokio_stream_from(
        mut rx: tokio::sync::mpsc::UnboundedReceiver<crate::Result<Fragment>>,
    ) -> impl Stream<Item = crate::Result<Fragment>> + Send {
        stream::poll_fn(move |cx| rx.poll_recv(cx))
    }
}
