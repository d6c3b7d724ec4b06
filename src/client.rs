use std::time::{Duration, Instant};

use futures::future;
use futures::stream::{Stream, StreamExt};
use reqwest::header::{self, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::ndjson::process_ndjson;
use crate::observability::{CLIENT_CONNECT_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::source::{ChunkSource, FragmentStream};
use crate::types::{ChatChunk, ChatRequest, Fragment, ModelList};

/// Default address of a locally-hosted model server.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Explicit settings for one [`Ollama`] client.
///
/// The model is not part of the client; it travels with each [`ChatRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Address of the model server.
    pub base_url: String,
    /// How long to wait for a connection to be established.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Creates settings for the server at `base_url` with the default connect timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Client for a locally-hosted Ollama-compatible model server.
///
/// A client is constructed from explicit settings for each conversation; there is no
/// process-wide instance.  No overall request timeout is applied because a streamed turn
/// stays open for as long as the model keeps generating.
#[derive(Debug, Clone)]
pub struct Ollama {
    client: ReqwestClient,
    base_url: Url,
    connect_timeout: Duration,
}

impl Ollama {
    /// Create a new client for the server at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_options(base_url, None)
    }

    /// Create a new client from explicit settings.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::with_options(&config.base_url, Some(config.connect_timeout))
    }

    /// Create a new client with custom settings.
    pub fn with_options(base_url: &str, connect_timeout: Option<Duration>) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let connect_timeout = connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            connect_timeout,
        })
    }

    /// Returns the normalized server root, always ending in `/`.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.connect_timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response, resource: Option<&str>) -> Error {
        let status_code = response.status().as_u16();

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let message = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error)
            .unwrap_or(error_body);

        match status_code {
            400 => Error::bad_request(message),
            404 => Error::not_found(message, resource.map(String::from)),
            500..=599 => Error::internal_server(message),
            _ => Error::api(status_code, message),
        }
    }

    async fn get(&self, path: &str) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let response = self
            .client
            .get(self.endpoint(path)?)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                self.map_send_error(e)
            })?;
        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response, Some(path)).await);
        }
        Ok(response)
    }

    /// Returns the server's version string.  Useful as a reachability check.
    pub async fn probe(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct Version {
            version: String,
        }

        let response = self.get("api/version").await?;
        let version = response.json::<Version>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse version response: {e}"),
                Some(Box::new(e)),
            )
        })?;
        Ok(version.version)
    }

    /// Returns the identifiers of the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self.get("api/tags").await?;
        let list = response.json::<ModelList>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse model list: {e}"),
                Some(Box::new(e)),
            )
        })?;
        Ok(list.names())
    }

    /// Send a chat request and get a streaming response.
    ///
    /// Returns a stream of fragments that can be processed incrementally.
    pub async fn chat_stream(&self, mut request: ChatRequest) -> Result<FragmentStream> {
        request.stream = true;
        CLIENT_REQUESTS.click();
        let started = Instant::now();

        let response = self
            .client
            .post(self.endpoint("api/chat")?)
            .header(header::ACCEPT, HeaderValue::from_static("application/x-ndjson"))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                self.map_send_error(e)
            })?;
        CLIENT_CONNECT_DURATION.add(started.elapsed().as_secs_f64());

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response, Some(&request.model)).await);
        }

        let chunks = process_ndjson(response.bytes_stream());
        Ok(Box::pin(fragments_from_chunks(chunks)))
    }
}

#[async_trait::async_trait]
impl ChunkSource for Ollama {
    async fn open(&self, request: ChatRequest) -> Result<FragmentStream> {
        self.chat_stream(request).await
    }
}

/// Map streamed records to fragments.
///
/// The server streams reasoning as deltas; fragments carry it cumulative-to-date so that
/// sinks which redraw can do so from any single event.  Answer text stays a delta.
pub(crate) fn fragments_from_chunks<S>(chunks: S) -> impl Stream<Item = Result<Fragment>>
where
    S: Stream<Item = Result<ChatChunk>>,
{
    chunks.scan(String::new(), |reasoning, item| {
        let item = item.map(|chunk| {
            let mut fragment = chunk.into_fragment();
            if let Some(slice) = fragment.reasoning.take() {
                reasoning.push_str(&slice);
                fragment.reasoning = Some(reasoning.clone());
            }
            fragment
        });
        future::ready(Some(item))
    })
}

/// Parse a server address into the root that API paths are joined onto.
///
/// Accepts addresses with or without a trailing slash and strips the `/v1` suffix used by
/// OpenAI-compatible configurations.
fn normalize_base_url(base_url: &str) -> Result<Url> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/v1").unwrap_or(trimmed);
    let url = Url::parse(&format!("{trimmed}/"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::validation(
            format!("unsupported scheme '{scheme}' in server address"),
            Some("base_url".to_string()),
        )),
    }
}
