//! # flowchat
//!
//! A streaming chat-completion provider for OpenAI-compatible vendor endpoints.
//!
//! ## Overview
//!
//! The host hands over a conversation ([`ChatMessage`]s made of text and image
//! parts). The provider translates it to the vendor's JSON schema, sends it with a
//! bearer token from the [`CredentialService`], and turns the Server-Sent Events
//! response into a single stream of [`NormalizedEvent`]s:
//!
//! - [`NormalizedEvent::TextDelta`] for each content fragment
//! - [`NormalizedEvent::ToolCallDelta`] for each tool-call fragment, tagged with its index
//! - [`NormalizedEvent::Done`] when a choice reports a finish reason
//!
//! Chunk boundaries never matter: a frame split across network reads produces the
//! same events as the same frame delivered whole.
//!
//! ## Key Features
//!
//! - **One event shape**: push streams, pull readers and buffered bodies are all adapted
//! - **Tool calls**: tool specs on the request, index-tagged deltas on the response,
//!   [`ToolCallAccumulator`] to reassemble them
//! - **Images**: byte and base64 image parts become data URIs
//! - **Cancellation**: a [`CancellationToken`](tokio_util::sync::CancellationToken)
//!   stops the stream between events
//! - **Credentials**: injected secret store with change notification
//! - **Retry Logic**: caller-side exponential backoff in [`retry`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use flowchat::{
//!     ChatMessage, ChatProvider, CredentialService, InMemorySecretStore, NormalizedEvent,
//!     ProviderOptions, RequestOptions,
//! };
//! use futures::StreamExt;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemorySecretStore::with_secret("iflow.apiKey", "sk-..."));
//!     let credentials = Arc::new(CredentialService::init(store, "iflow.apiKey").await);
//!     let provider = ChatProvider::new(ProviderOptions::default(), credentials)?;
//!
//!     let messages = vec![
//!         ChatMessage::system("You are a helpful assistant"),
//!         ChatMessage::user("What's the capital of France?"),
//!     ];
//!     let response = provider
//!         .send_chat_request(
//!             "iFlow/qwen3-max",
//!             "example",
//!             &messages,
//!             RequestOptions::new(),
//!             CancellationToken::new(),
//!         )
//!         .await?;
//!
//!     let mut events = response.events;
//!     while let Some(event) = events.next().await {
//!         match event? {
//!             NormalizedEvent::TextDelta(text) => print!("{}", text),
//!             NormalizedEvent::ToolCallDelta(delta) => println!("tool call #{}", delta.index),
//!             NormalizedEvent::Done(reason) => println!("\n[{}]", reason),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **types**: host messages, wire schema, normalized events, options
//! - **translate**: host conversation to wire request
//! - **transport**: HTTP send, header timeout, response body shapes
//! - **sse**: frame splitting and the incremental decoder
//! - **interpret**: chunk JSON to events, tool-call reassembly
//! - **adapter**: body shape to event stream, cancellation
//! - **provider**: the public entry points
//! - **credentials**: API token storage and change notification
//! - **context**: token estimation
//! - **tools**: tool specification builder
//! - **config**: vendor presets and environment overrides
//! - **retry**: exponential backoff
//! - **error**: the crate error type

mod adapter;
mod config;
mod context;
mod credentials;
mod error;
mod interpret;
mod provider;
mod sse;
mod tools;
mod translate;
mod transport;
mod types;

/// Caller-side retry with exponential backoff and jitter.
pub mod retry;

// --- Provider ---

pub use provider::{
    ChatProvider, ChatResponse, CollectedResponse, CompletionSignal, CompletionStatus,
    ModelCapabilities, ModelInfo,
};

// --- Streaming pipeline ---

pub use adapter::{EventStream, adapt};
pub use interpret::{ChunkInterpreter, CompletedToolCall, ToolCallAccumulator, decode_arguments};
pub use sse::{DecoderState, Frame, SseDecoder, classify_frame, split_frames};
pub use translate::{build_request, convert_content, convert_messages, convert_role};
pub use transport::{
    BodyMode, ChatTransport, FallbackBody, HttpTransport, PushEmitter, PushSource, RawResponse,
    ResponseBody, SourceEvent, push_channel,
};

// --- Configuration ---

pub use config::{BASE_URL_ENV, MODEL_ENV, Vendor, get_base_url, get_model};

// --- Credentials ---

pub use credentials::{
    API_KEY_ENV, CredentialService, EnvSecretStore, InMemorySecretStore, SecretStore,
};

// --- Context Management ---

pub use context::{TokenInput, estimate_messages, estimate_tokens, is_approaching_limit};

// --- Error Handling ---

pub use error::{Error, Result};

// --- Tool System ---

pub use tools::{ToolBuilder, ToolSpec, tool};

// --- Core Types ---

pub use types::{
    ChatMessage, ChatRole, ContentPart, DEFAULT_MAX_INPUT_TOKENS, DEFAULT_MAX_OUTPUT_TOKENS,
    DEFAULT_SECRET_KEY, DEFAULT_TIMEOUT_SECS, ImageData, NormalizedEvent, ProviderOptions,
    ProviderOptionsBuilder, RequestOptions, ToolCallDelta, ToolChoice, WireChoice, WireChunk,
    WireContent, WireContentPart, WireDelta, WireFunctionDelta, WireImageUrl, WireMessage,
    WireRequest, WireToolCallDelta,
};

/// Convenience module containing the most commonly used types and functions.
/// Import with `use flowchat::prelude::*;`.
pub mod prelude {
    pub use crate::{
        ChatMessage, ChatProvider, ChatResponse, ContentPart, CredentialService, Error,
        InMemorySecretStore, NormalizedEvent, ProviderOptions, RequestOptions, Result,
        ToolCallDelta, ToolSpec, tool,
    };
}
