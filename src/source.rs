//! The chunk source boundary.
//!
//! A [`ChunkSource`] opens one ordered, cancelable stream of [`Fragment`]s per turn.  The
//! HTTP client in [`crate::client`] is the production implementation; [`ScriptedSource`]
//! replays a fixed script and backs offline front ends and tests.

use std::pin::Pin;
use std::sync::Mutex;

use futures::Stream;
use futures::stream;

use crate::{ChatRequest, Error, Fragment, Result};

/// A lazily consumed sequence of fragments for one turn.
///
/// Dropping the stream releases whatever connection backs it.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment>> + Send>>;

/// Something that can answer a chat request with a stream of fragments.
///
/// Reasoning slices are delivered cumulative-to-date; answer slices are deltas.
#[async_trait::async_trait]
pub trait ChunkSource: Send + Sync {
    /// Opens the fragment stream for one turn.
    ///
    /// An error here means the source could not be established at all.
    async fn open(&self, request: ChatRequest) -> Result<FragmentStream>;
}

/// A chunk source that replays the same script for every request.
pub struct ScriptedSource {
    script: Vec<Result<Fragment>>,
    open_error: Option<Error>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedSource {
    /// Creates a source that yields `script` in order and then ends.
    pub fn new(script: Vec<Result<Fragment>>) -> Self {
        Self {
            script,
            open_error: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a source whose `open` always fails with `error`.
    pub fn unavailable(error: Error) -> Self {
        Self {
            script: Vec::new(),
            open_error: Some(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns every request this source has been asked to open.
    pub fn requests(&self) -> Vec<ChatRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait::async_trait]
impl ChunkSource for ScriptedSource {
    async fn open(&self, request: ChatRequest) -> Result<FragmentStream> {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        Ok(Box::pin(stream::iter(self.script.clone())))
    }
}
