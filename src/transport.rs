//! HTTP transport and response body shapes.
//!
//! A [`ChatTransport`] sends one serialized [`WireRequest`] and hands back a
//! [`RawResponse`]: the status plus a [`ResponseBody`] whose ownership passes to the
//! stream adapter. Bodies come in three shapes:
//!
//! - [`ResponseBody::Push`]: a subscription delivering data/end/error notifications
//!   as bytes arrive ([`PushSource`], fed by a [`PushEmitter`])
//! - [`ResponseBody::Pull`]: an [`AsyncRead`] that must be drained explicitly
//! - [`ResponseBody::Buffered`]: a value already fully in memory ([`FallbackBody`])
//!
//! [`HttpTransport`] is the reqwest-backed implementation. It applies the timeout to
//! the wait for response headers only; once streaming starts, only the caller's
//! cancellation token can stop it. There is no retry here.

use crate::types::WireRequest;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Notification delivered by a push-style body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Data(Bytes),
    End,
    Error(String),
}

/// Sending half of a push-style body.
#[derive(Debug, Clone)]
pub struct PushEmitter {
    tx: mpsc::UnboundedSender<SourceEvent>,
}

impl PushEmitter {
    /// Deliver a chunk. Returns `false` once the receiving side is gone.
    pub fn data(&self, chunk: impl Into<Bytes>) -> bool {
        self.tx.send(SourceEvent::Data(chunk.into())).is_ok()
    }

    /// Signal a clean end of stream.
    pub fn end(&self) {
        let _ = self.tx.send(SourceEvent::End);
    }

    /// Signal a terminal failure.
    pub fn error(&self, message: impl Into<String>) {
        let _ = self.tx.send(SourceEvent::Error(message.into()));
    }

    /// Whether the subscriber has been released.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the subscriber has been released.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Receiving half of a push-style body.
#[derive(Debug)]
pub struct PushSource {
    rx: mpsc::UnboundedReceiver<SourceEvent>,
}

/// Create a connected emitter/source pair.
pub fn push_channel() -> (PushEmitter, PushSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PushEmitter { tx }, PushSource { rx })
}

impl PushSource {
    /// Subscribe to a byte stream: a background task forwards each chunk as a
    /// notification and stops as soon as the source is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_byte_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let (emitter, source) = push_channel();
        tokio::spawn(async move {
            let mut stream = Box::pin(stream);
            loop {
                // A stalled upstream must not outlive its subscriber
                let item = tokio::select! {
                    biased;
                    _ = emitter.closed() => {
                        log::debug!("Push subscriber released, stopping body forwarding");
                        return;
                    }
                    item = stream.next() => item,
                };
                match item {
                    Some(Ok(chunk)) => {
                        if !emitter.data(chunk) {
                            log::debug!("Push subscriber released, stopping body forwarding");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        emitter.error(e.to_string());
                        return;
                    }
                    None => break,
                }
            }
            emitter.end();
        });
        source
    }

    /// Wait for the next notification. `None` means every emitter was dropped,
    /// which is treated like [`SourceEvent::End`].
    pub async fn next_event(&mut self) -> Option<SourceEvent> {
        self.rx.recv().await
    }
}

/// A body that is already in memory, in whatever form the transport produced it.
pub enum FallbackBody {
    /// Raw bytes, decoded as UTF-8
    Bytes(Bytes),
    /// Existing text
    Text(String),
    /// A value with a meaningful string conversion
    Display(Box<dyn fmt::Display + Send + Sync>),
    /// A value with no textual form
    Opaque,
}

impl fmt::Debug for FallbackBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackBody::Bytes(b) => write!(f, "FallbackBody::Bytes({} bytes)", b.len()),
            FallbackBody::Text(t) => write!(f, "FallbackBody::Text({} chars)", t.len()),
            FallbackBody::Display(_) => f.write_str("FallbackBody::Display(..)"),
            FallbackBody::Opaque => f.write_str("FallbackBody::Opaque"),
        }
    }
}

impl FallbackBody {
    /// Coerce to text, preferring bytes, then text, then the `Display` conversion.
    ///
    /// An opaque value yields `None` rather than a placeholder string.
    pub fn into_text(self) -> Option<String> {
        match self {
            FallbackBody::Bytes(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            FallbackBody::Text(text) => Some(text),
            FallbackBody::Display(value) => Some(value.to_string()),
            FallbackBody::Opaque => {
                log::error!("Cannot convert response body of unknown shape to text");
                None
            }
        }
    }
}

/// Response body, in one of the three supported shapes.
pub enum ResponseBody {
    Push(PushSource),
    Pull(Box<dyn AsyncRead + Send + Unpin>),
    Buffered(FallbackBody),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Push(_) => f.write_str("ResponseBody::Push"),
            ResponseBody::Pull(_) => f.write_str("ResponseBody::Pull"),
            ResponseBody::Buffered(b) => write!(f, "ResponseBody::Buffered({:?})", b),
        }
    }
}

impl ResponseBody {
    pub fn pull(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        ResponseBody::Pull(Box::new(reader))
    }

    pub fn text(text: impl Into<String>) -> Self {
        ResponseBody::Buffered(FallbackBody::Text(text.into()))
    }

    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        ResponseBody::Buffered(FallbackBody::Bytes(bytes.into()))
    }

    /// Short name of the shape, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ResponseBody::Push(_) => "push",
            ResponseBody::Pull(_) => "pull",
            ResponseBody::Buffered(_) => "buffered",
        }
    }
}

/// Status and body of a successful response.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub body: ResponseBody,
}

/// Sends a chat-completions request.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Issue the request.
    ///
    /// # Errors
    ///
    /// - [`Error::Api`] for any status other than 200, carrying the error body
    /// - [`Error::Timeout`] when headers do not arrive within `timeout`
    /// - [`Error::Cancelled`] when `cancel` fires before headers arrive
    /// - [`Error::Http`] for network failures
    async fn send(
        &self,
        request: &WireRequest,
        auth_token: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RawResponse>;
}

/// How [`HttpTransport`] exposes the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyMode {
    /// Forward chunks as they arrive
    #[default]
    Push,
    /// Hand out an `AsyncRead` over the body
    Pull,
}

/// reqwest-backed transport posting to a fixed chat-completions URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    body_mode: BodyMode,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().build().map_err(Error::Http)?;
        Ok(Self::with_client(client, url))
    }

    /// Use a preconfigured client (proxies, TLS roots, ...).
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            body_mode: BodyMode::default(),
        }
    }

    pub fn with_body_mode(mut self, mode: BodyMode) -> Self {
        self.body_mode = mode;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(
        &self,
        request: &WireRequest,
        auth_token: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RawResponse> {
        log::info!("Making request to: {}", self.url);

        let pending = self
            .client
            .post(&self.url)
            .bearer_auth(auth_token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(request)
            .send();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = tokio::time::timeout(timeout, pending) => Some(result),
        };

        let response = match outcome {
            None => return Err(Error::Cancelled),
            Some(Err(_elapsed)) => return Err(Error::Timeout),
            Some(Ok(Err(e))) if e.is_timeout() => return Err(Error::Timeout),
            Some(Ok(result)) => result.map_err(Error::Http)?,
        };

        let status = response.status().as_u16();
        log::info!("Response status: {}", status);

        if status != 200 {
            let body = match tokio::time::timeout(timeout, response.text()).await {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    log::warn!("Failed to read error response body: {}", e);
                    String::new()
                }
                Err(_) => {
                    log::warn!("Timed out reading error response body");
                    String::new()
                }
            };
            return Err(Error::api(status, body));
        }

        let body = match self.body_mode {
            BodyMode::Push => ResponseBody::Push(PushSource::from_byte_stream(response.bytes_stream())),
            BodyMode::Pull => {
                let stream = response.bytes_stream().map(|r| r.map_err(std::io::Error::other));
                ResponseBody::pull(tokio_util::io::StreamReader::new(stream))
            }
        };

        Ok(RawResponse { status, body })
    }
}
