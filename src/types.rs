//! Core types for the flowchat SDK
//!
//! Three groups live here:
//!
//! - **Host-side types** ([`ChatMessage`], [`ContentPart`], [`ChatRole`]) describe a
//!   conversation the way the host application sees it.
//! - **Wire types** (`Wire*`) mirror the vendor's chat-completions JSON schema for
//!   requests and streamed chunks.
//! - **Normalized output** ([`NormalizedEvent`]) is what the stream adapter yields.
//!
//! Configuration ([`ProviderOptions`], [`RequestOptions`]) is also defined here,
//! following the builder pattern used throughout the crate.

use crate::config::Vendor;
use crate::tools::ToolSpec;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Default ceiling for `max_tokens` when a request does not override it.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 32_768;

/// Default context window advertised in model metadata.
pub const DEFAULT_MAX_INPUT_TOKENS: u32 = 200_000;

/// Default request timeout in seconds (headers only, not the stream body).
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Key under which the vendor API token is stored in the secret store.
pub const DEFAULT_SECRET_KEY: &str = "iflow.apiKey";

// ============================================================================
// PROVIDER OPTIONS
// ============================================================================

/// Options for configuring a chat provider
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// Vendor display name (used in model ids and metadata)
    pub vendor: String,

    /// Chat-completions endpoint base URL (without the `/chat/completions` suffix)
    pub base_url: String,

    /// Model used when neither the request nor the caller names one
    pub model: String,

    /// Model family reported in model metadata
    pub family: String,

    /// Timeout in seconds for obtaining response headers
    pub timeout: u64,

    /// `max_tokens` sent when a request leaves it unset
    pub default_max_tokens: u32,

    /// Temperature sent when a request leaves it unset (None omits the field)
    pub temperature: Option<f32>,

    /// Context window advertised in model metadata
    pub max_input_tokens: u32,

    /// Key used to look up the API token in the secret store
    pub secret_key: String,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        let vendor = Vendor::IFlow;
        Self {
            vendor: vendor.display_name().to_string(),
            base_url: vendor.default_url().to_string(),
            model: vendor.default_model().to_string(),
            family: vendor.default_family().to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            default_max_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: None,
            max_input_tokens: DEFAULT_MAX_INPUT_TOKENS,
            secret_key: DEFAULT_SECRET_KEY.to_string(),
        }
    }
}

impl ProviderOptions {
    /// Create a new builder for ProviderOptions
    pub fn builder() -> ProviderOptionsBuilder {
        ProviderOptionsBuilder::default()
    }

    /// Full URL of the chat-completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Builder for ProviderOptions
#[derive(Debug, Default)]
pub struct ProviderOptionsBuilder {
    vendor: Option<Vendor>,
    base_url: Option<String>,
    model: Option<String>,
    family: Option<String>,
    timeout: Option<u64>,
    default_max_tokens: Option<u32>,
    temperature: Option<f32>,
    max_input_tokens: Option<u32>,
    secret_key: Option<String>,
}

impl ProviderOptionsBuilder {
    /// Start from a vendor preset; explicit `base_url`/`model` still win.
    pub fn vendor(mut self, vendor: Vendor) -> Self {
        self.vendor = Some(vendor);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn default_max_tokens(mut self, tokens: u32) -> Self {
        self.default_max_tokens = Some(tokens);
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_input_tokens(mut self, tokens: u32) -> Self {
        self.max_input_tokens = Some(tokens);
        self
    }

    pub fn secret_key(mut self, key: impl Into<String>) -> Self {
        self.secret_key = Some(key.into());
        self
    }

    pub fn build(self) -> crate::Result<ProviderOptions> {
        let vendor = self.vendor.unwrap_or(Vendor::IFlow);

        let base_url = self
            .base_url
            .unwrap_or_else(|| vendor.default_url().to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(crate::Error::config(format!(
                "base_url must be an http(s) URL, got '{}'",
                base_url
            )));
        }

        let model = self
            .model
            .unwrap_or_else(|| vendor.default_model().to_string());
        if model.trim().is_empty() {
            return Err(crate::Error::config("model must not be empty"));
        }

        let default_max_tokens = self.default_max_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS);
        if default_max_tokens == 0 {
            return Err(crate::Error::config("default_max_tokens must be positive"));
        }

        if let Some(temp) = self.temperature {
            if !(0.0..=2.0).contains(&temp) {
                return Err(crate::Error::config(format!(
                    "temperature must be between 0.0 and 2.0, got {}",
                    temp
                )));
            }
        }

        Ok(ProviderOptions {
            vendor: vendor.display_name().to_string(),
            base_url,
            model,
            family: self
                .family
                .unwrap_or_else(|| vendor.default_family().to_string()),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
            default_max_tokens,
            temperature: self.temperature,
            max_input_tokens: self.max_input_tokens.unwrap_or(DEFAULT_MAX_INPUT_TOKENS),
            secret_key: self
                .secret_key
                .unwrap_or_else(|| DEFAULT_SECRET_KEY.to_string()),
        })
    }
}

/// Per-request overrides passed alongside the messages.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Model override for this request
    pub model: Option<String>,

    /// Sampling temperature override
    pub temperature: Option<f32>,

    /// `max_tokens` override; the provider's ceiling is used when unset
    pub max_tokens: Option<u32>,

    /// Tools the model may call
    pub tools: Vec<ToolSpec>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn with_tool(mut self, tool: ToolSpec) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools.extend(tools);
        self
    }
}

// ============================================================================
// HOST-SIDE MESSAGES
// ============================================================================

/// Message role as the host application names it.
///
/// The vendor only understands `system`, `user` and `assistant`; anything else is
/// carried as [`ChatRole::Other`] and sent as `user`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Other(String),
}

/// Binary payload of an image part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageData {
    /// Raw image bytes
    Bytes(Bytes),
    /// Payload that is already base64 encoded
    Base64(String),
    /// A representation the host could not hand over as bytes
    Opaque,
}

/// One part of a message's content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Image { mime_type: String, data: ImageData },
}

impl ContentPart {
    pub fn text(value: impl Into<String>) -> Self {
        ContentPart::Text(value.into())
    }

    pub fn image(mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        ContentPart::Image {
            mime_type: mime_type.into(),
            data: ImageData::Bytes(bytes.into()),
        }
    }

    /// Text value, if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(value) => Some(value),
            ContentPart::Image { .. } => None,
        }
    }
}

/// A message in the conversation. Always holds at least one content part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    role: ChatRole,
    content: Vec<ContentPart>,
}

impl ChatMessage {
    /// Create a message from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] when `content` is empty.
    pub fn new(role: ChatRole, content: Vec<ContentPart>) -> crate::Result<Self> {
        if content.is_empty() {
            return Err(crate::Error::invalid_input(
                "a chat message needs at least one content part",
            ));
        }
        Ok(Self { role, content })
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: vec![ContentPart::text(text)],
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: vec![ContentPart::text(text)],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: vec![ContentPart::text(text)],
        }
    }

    /// Create a user message with a text prompt followed by an image.
    pub fn user_with_image(
        text: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            role: ChatRole::User,
            content: vec![ContentPart::text(text), ContentPart::image(mime_type, bytes)],
        }
    }

    pub fn role(&self) -> &ChatRole {
        &self.role
    }

    pub fn content(&self) -> &[ContentPart] {
        &self.content
    }
}

// ============================================================================
// NORMALIZED OUTPUT
// ============================================================================

/// One tool-call fragment as it arrived in a single stream frame.
///
/// `index` identifies the logical call within the response turn; deltas with
/// the same index belong together. `id` and `name` usually only appear on the
/// first delta for an index.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallDelta {
    pub index: u32,
    pub call_id: Option<String>,
    pub name: Option<String>,
    /// Raw argument text carried by this delta
    pub arguments: String,
    /// `arguments` decoded as JSON; `None` when the text is only a fragment
    pub input: Option<serde_json::Value>,
}

/// An event produced by the stream adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedEvent {
    TextDelta(String),
    ToolCallDelta(ToolCallDelta),
    /// A choice reported its finish reason (`stop`, `tool_calls`, `length`, ...)
    Done(String),
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

/// Tool-choice policy. Only `auto` is ever sent; "none" is expressed by omitting
/// the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
}

/// Chat-completions request body
#[derive(Debug, Clone, Serialize)]
pub struct WireRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

/// Request message
#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: String,
    pub content: WireContent,
}

/// Message content: a bare string or an array of typed parts
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Parts(Vec<WireContentPart>),
}

/// Typed content part
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireContentPart {
    Text { text: String },
    ImageUrl { image_url: WireImageUrl },
}

/// Image reference inside a content part
#[derive(Debug, Clone, Serialize)]
pub struct WireImageUrl {
    pub url: String,
}

/// Streaming chunk. Only `choices` is required for decoding; the rest is
/// informational and tolerated when missing.
#[derive(Debug, Clone, Deserialize)]
pub struct WireChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<WireChoice>,
}

/// Choice in a streaming chunk
#[derive(Debug, Clone, Deserialize)]
pub struct WireChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: WireDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Delta in a streaming choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<WireToolCallDelta>>,
}

/// Tool call delta
#[derive(Debug, Clone, Deserialize)]
pub struct WireToolCallDelta {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub call_type: Option<String>,
    #[serde(default)]
    pub function: Option<WireFunctionDelta>,
}

/// Function delta
#[derive(Debug, Clone, Deserialize)]
pub struct WireFunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_options_builder() {
        let options = ProviderOptions::builder()
            .base_url("http://localhost:1234/v1")
            .model("test-model")
            .family("test-family")
            .timeout(30)
            .default_max_tokens(1000)
            .temperature(0.5)
            .max_input_tokens(8000)
            .secret_key("test.key")
            .build()
            .unwrap();

        assert_eq!(options.base_url, "http://localhost:1234/v1");
        assert_eq!(options.model, "test-model");
        assert_eq!(options.family, "test-family");
        assert_eq!(options.timeout, 30);
        assert_eq!(options.default_max_tokens, 1000);
        assert_eq!(options.temperature, Some(0.5));
        assert_eq!(options.max_input_tokens, 8000);
        assert_eq!(options.secret_key, "test.key");
    }

    #[test]
    fn test_provider_options_builder_defaults() {
        let options = ProviderOptions::builder().build().unwrap();

        assert_eq!(options.vendor, "iFlow");
        assert_eq!(options.base_url, "https://apis.iflow.cn/v1");
        assert_eq!(options.model, "qwen3-max");
        assert_eq!(options.family, "TBStars");
        assert_eq!(options.timeout, 60);
        assert_eq!(options.default_max_tokens, 32_768);
        assert_eq!(options.temperature, None);
        assert_eq!(options.secret_key, "iflow.apiKey");
    }

    #[test]
    fn test_provider_options_debug_lists_every_field() {
        let rendered = format!("{:?}", ProviderOptions::default());
        for field in [
            "vendor",
            "base_url",
            "model",
            "family",
            "timeout",
            "default_max_tokens",
            "temperature",
            "max_input_tokens",
            "secret_key",
        ] {
            assert!(rendered.contains(field), "missing {} in {}", field, rendered);
        }
        assert!(rendered.contains("\"TBStars\""));
    }

    #[test]
    fn test_provider_options_builder_rejects_invalid() {
        assert!(ProviderOptions::builder().base_url("ftp://x").build().is_err());
        assert!(ProviderOptions::builder().model("  ").build().is_err());
        assert!(ProviderOptions::builder().default_max_tokens(0).build().is_err());
        assert!(ProviderOptions::builder().temperature(3.5).build().is_err());
    }

    #[test]
    fn test_completions_url_trims_trailing_slash() {
        let options = ProviderOptions::builder()
            .base_url("http://localhost:8080/v1/")
            .build()
            .unwrap();
        assert_eq!(
            options.completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_chat_message_requires_content() {
        let result = ChatMessage::new(ChatRole::User, vec![]);
        assert!(matches!(result, Err(crate::Error::InvalidInput(_))));
    }

    #[test]
    fn test_chat_message_user_with_image() {
        let msg = ChatMessage::user_with_image("look", "image/png", vec![1u8, 2, 3]);
        assert_eq!(msg.role(), &ChatRole::User);
        assert_eq!(msg.content().len(), 2);
        assert_eq!(msg.content()[0].as_text(), Some("look"));
        assert!(msg.content()[1].as_text().is_none());
    }

    #[test]
    fn test_request_options_chain() {
        let opts = RequestOptions::new()
            .with_model("other")
            .with_temperature(0.2)
            .with_max_tokens(512);
        assert_eq!(opts.model.as_deref(), Some("other"));
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(512));
        assert!(opts.tools.is_empty());
    }

    #[test]
    fn test_wire_chunk_deserialization_tolerates_missing_fields() {
        let json = r#"{"choices":[{"delta":{"content":"Hi"}}]}"#;
        let chunk: WireChunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.id, None);
        assert_eq!(chunk.choices.len(), 1);
        assert_eq!(chunk.choices[0].index, 0);
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hi"));
        assert_eq!(chunk.choices[0].finish_reason, None);
    }

    #[test]
    fn test_wire_chunk_tool_call_deserialization() {
        let json = r#"{
            "id": "chunk_1",
            "object": "chat.completion.chunk",
            "created": 1234567890,
            "model": "qwen3-max",
            "choices": [{
                "index": 0,
                "delta": {
                    "tool_calls": [{
                        "index": 1,
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "read_file", "arguments": "{}"}
                    }]
                },
                "finish_reason": null
            }]
        }"#;

        let chunk: WireChunk = serde_json::from_str(json).unwrap();
        let calls = chunk.choices[0].delta.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].index, 1);
        assert_eq!(calls[0].call_type.as_deref(), Some("function"));
        assert_eq!(
            calls[0].function.as_ref().unwrap().name.as_deref(),
            Some("read_file")
        );
    }

    #[test]
    fn test_tool_choice_serialization() {
        assert_eq!(serde_json::to_string(&ToolChoice::Auto).unwrap(), "\"auto\"");
    }
}
