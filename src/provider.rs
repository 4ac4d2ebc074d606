//! The host-facing chat provider.
//!
//! [`ChatProvider::send_chat_request`] runs the whole pipeline for one request:
//!
//! ```text
//! ChatMessage[] ──translate──▶ WireRequest ──transport──▶ RawResponse
//!                                                          │
//!                               ChatResponse ◀──adapt──────┘
//!                               ├─ events: EventStream
//!                               └─ completion: CompletionSignal
//! ```
//!
//! The API token is snapshotted from the [`CredentialService`] when the request
//! starts. Without a token the call fails with [`Error::Config`] before any network
//! I/O, and [`ChatProvider::provide_model_info`] reports no models.

use crate::adapter::{EventStream, adapt};
use crate::context::{TokenInput, estimate_tokens};
use crate::credentials::{CredentialService, mask};
use crate::interpret::{CompletedToolCall, ToolCallAccumulator};
use crate::transport::{ChatTransport, HttpTransport};
use crate::translate::build_request;
use crate::types::{ChatMessage, NormalizedEvent, ProviderOptions, RequestOptions};
use crate::{Error, Result};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

const REQUEST_LOG_PREVIEW: usize = 500;

/// What a model can do, as advertised to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelCapabilities {
    pub vision: bool,
    pub tool_calling: bool,
    pub agent_mode: bool,
}

/// Model metadata returned by [`ChatProvider::provide_model_info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    /// `<vendor>/<model>`
    pub id: String,
    pub vendor: String,
    pub name: String,
    pub family: String,
    pub version: String,
    pub max_input_tokens: u32,
    pub max_output_tokens: u32,
    pub capabilities: ModelCapabilities,
}

/// How an event sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionStatus {
    /// Every event was delivered
    Completed,
    /// The stream yielded an error
    Failed(String),
    /// Cancelled, or the sequence was dropped before it was drained
    Cancelled,
}

/// Resolves once the paired event sequence is drained, fails, or is dropped.
#[derive(Debug)]
pub struct CompletionSignal {
    rx: oneshot::Receiver<CompletionStatus>,
}

impl CompletionSignal {
    pub async fn wait(self) -> CompletionStatus {
        self.rx.await.unwrap_or(CompletionStatus::Cancelled)
    }
}

/// Everything gathered from a drained response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedResponse {
    /// Concatenated text, with a trailing error line if the stream failed
    pub text: String,
    pub tool_calls: Vec<CompletedToolCall>,
    pub finish_reason: Option<String>,
    pub error: Option<String>,
}

/// Result of [`ChatProvider::send_chat_request`].
pub struct ChatResponse {
    pub events: EventStream,
    pub completion: CompletionSignal,
}

impl std::fmt::Debug for ChatResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatResponse")
            .field("events", &"EventStream")
            .field("completion", &self.completion)
            .finish()
    }
}

impl ChatResponse {
    /// Pair an event stream with a completion signal.
    pub fn new(events: EventStream, cancel: CancellationToken) -> Self {
        let (tx, rx) = oneshot::channel();
        let events = track_completion(events, cancel, tx);
        Self {
            events,
            completion: CompletionSignal { rx },
        }
    }

    pub fn into_parts(self) -> (EventStream, CompletionSignal) {
        (self.events, self.completion)
    }

    /// Drain the stream, reassembling tool calls by index.
    ///
    /// A stream failure does not discard what arrived before it: the error is
    /// recorded and appended to `text` as a single line.
    pub async fn collect(self) -> CollectedResponse {
        let mut events = self.events;
        let mut collected = CollectedResponse::default();
        let mut accumulator = ToolCallAccumulator::new();

        while let Some(item) = events.next().await {
            match item {
                Ok(NormalizedEvent::TextDelta(text)) => collected.text.push_str(&text),
                Ok(NormalizedEvent::ToolCallDelta(delta)) => {
                    collected.tool_calls.extend(accumulator.push(&delta));
                }
                Ok(NormalizedEvent::Done(reason)) => collected.finish_reason = Some(reason),
                Err(e) => {
                    let message = e.to_string();
                    if !collected.text.is_empty() {
                        collected.text.push('\n');
                    }
                    collected.text.push_str(&message);
                    collected.error = Some(message);
                }
            }
        }
        collected.tool_calls.extend(accumulator.finish());

        collected
    }
}

fn track_completion(
    mut inner: EventStream,
    cancel: CancellationToken,
    tx: oneshot::Sender<CompletionStatus>,
) -> EventStream {
    Box::pin(async_stream::stream! {
        let mut tx = Some(tx);
        while let Some(item) = inner.next().await {
            if let Err(e) = &item {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(CompletionStatus::Failed(e.to_string()));
                }
            }
            yield item;
        }
        if let Some(tx) = tx.take() {
            let status = if cancel.is_cancelled() {
                CompletionStatus::Cancelled
            } else {
                CompletionStatus::Completed
            };
            let _ = tx.send(status);
        }
    })
}

/// Streaming chat-completion provider for one vendor endpoint.
pub struct ChatProvider {
    options: ProviderOptions,
    credentials: Arc<CredentialService>,
    transport: Arc<dyn ChatTransport>,
}

impl std::fmt::Debug for ChatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatProvider")
            .field("options", &self.options)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl ChatProvider {
    /// Create a provider talking HTTP to `options.base_url`.
    pub fn new(options: ProviderOptions, credentials: Arc<CredentialService>) -> Result<Self> {
        let transport = HttpTransport::new(options.completions_url())?;
        Ok(Self::with_transport(options, credentials, Arc::new(transport)))
    }

    /// Create a provider with a custom transport.
    pub fn with_transport(
        options: ProviderOptions,
        credentials: Arc<CredentialService>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            options,
            credentials,
            transport,
        }
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    pub fn credentials(&self) -> &Arc<CredentialService> {
        &self.credentials
    }

    /// `<vendor>/<default model>`
    pub fn model_id(&self) -> String {
        format!("{}/{}", self.options.vendor, self.options.model)
    }

    /// Advertised models: one entry when a credential is available, none otherwise.
    pub fn provide_model_info(&self) -> Vec<ModelInfo> {
        if !self.credentials.has_api_key() {
            log::debug!("No API key configured, advertising no models");
            return Vec::new();
        }

        vec![ModelInfo {
            id: self.model_id(),
            vendor: self.options.vendor.clone(),
            name: self.options.model.clone(),
            family: self.options.family.clone(),
            version: "1.0".to_string(),
            max_input_tokens: self.options.max_input_tokens,
            max_output_tokens: self.options.default_max_tokens,
            capabilities: ModelCapabilities {
                vision: true,
                tool_calling: true,
                agent_mode: true,
            },
        }]
    }

    /// Approximate token count (see [`crate::estimate_tokens`]).
    pub fn provide_token_count<'a>(&self, input: impl Into<TokenInput<'a>>) -> usize {
        estimate_tokens(input)
    }

    /// Pick the model: per-request override, then the host's model id (vendor
    /// prefix stripped), then the configured default.
    fn resolve_model(&self, model_id: &str, options: &RequestOptions) -> String {
        if let Some(model) = options.model.as_deref().filter(|m| !m.trim().is_empty()) {
            return model.to_string();
        }
        let prefix = format!("{}/", self.options.vendor);
        let stripped = model_id.strip_prefix(&prefix).unwrap_or(model_id);
        if stripped.trim().is_empty() {
            self.options.model.clone()
        } else {
            stripped.to_string()
        }
    }

    /// Send a streaming chat request.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when no API key is configured (no request is made)
    /// - [`Error::InvalidInput`] for an empty message list or a zero `max_tokens`
    /// - transport errors from [`ChatTransport::send`], e.g. [`Error::Api`] for a 401
    ///
    /// Errors during streaming arrive as items of the returned event stream.
    pub async fn send_chat_request(
        &self,
        model_id: &str,
        caller: &str,
        messages: &[ChatMessage],
        options: RequestOptions,
        cancel: CancellationToken,
    ) -> Result<ChatResponse> {
        let Some(api_key) = self.credentials.api_key() else {
            log::error!("API key not configured");
            return Err(Error::config(format!(
                "{} API key not configured",
                self.options.vendor
            )));
        };

        if messages.is_empty() {
            return Err(Error::invalid_input("at least one message is required"));
        }

        let max_tokens = options.max_tokens.unwrap_or(self.options.default_max_tokens);
        if max_tokens == 0 {
            return Err(Error::invalid_input("max_tokens must be positive"));
        }

        let model = self.resolve_model(model_id, &options);
        let temperature = options.temperature.or(self.options.temperature);
        let request = build_request(&model, messages, temperature, max_tokens, &options.tools);

        log::info!(
            "sendChatRequest: model={} caller={} messages={} tools={} key={}",
            model,
            caller,
            messages.len(),
            options.tools.len(),
            mask(&api_key)
        );
        if log::log_enabled!(log::Level::Debug) {
            if let Ok(body) = serde_json::to_string(&request) {
                let preview: String = body.chars().take(REQUEST_LOG_PREVIEW).collect();
                log::debug!("Request body ({} bytes): {}", body.len(), preview);
            }
        }

        let timeout = Duration::from_secs(self.options.timeout);
        let response = self
            .transport
            .send(&request, &api_key, timeout, &cancel)
            .await?;

        let events = adapt(response.body, cancel.clone());
        Ok(ChatResponse::new(events, cancel))
    }
}
