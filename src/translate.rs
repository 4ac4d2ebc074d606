//! Message translation from host messages to the vendor wire schema.
//!
//! The rules are small but easy to get subtly wrong:
//!
//! - Roles outside `system`/`user`/`assistant` are sent as `user`; translation never fails.
//! - A message whose content is exactly one text part is sent as a bare string.
//!   Everything else (several parts, or any image) becomes an array of typed parts.
//! - Images become `data:<mime>;base64,<payload>` URIs. An image whose payload the host
//!   could not provide is sent with an empty payload instead of failing the request.
//! - `tools` and `tool_choice` are either both present (non-empty tool list) or both absent.

use crate::tools::ToolSpec;
use crate::types::{
    ChatMessage, ChatRole, ContentPart, ImageData, ToolChoice, WireContent, WireContentPart,
    WireImageUrl, WireMessage, WireRequest,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Map a host role onto the vendor's role vocabulary.
pub fn convert_role(role: &ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::Other(_) => "user",
    }
}

/// Convert a message's parts to wire content.
pub fn convert_content(parts: &[ContentPart]) -> WireContent {
    if let [ContentPart::Text(value)] = parts {
        return WireContent::Text(value.clone());
    }

    let converted = parts
        .iter()
        .map(|part| match part {
            ContentPart::Text(value) => WireContentPart::Text {
                text: value.clone(),
            },
            ContentPart::Image { mime_type, data } => {
                let url = format!("data:{};base64,{}", mime_type, encode_image(data));
                log::debug!("Serializing image: {}", url_preview(&url));
                WireContentPart::ImageUrl {
                    image_url: WireImageUrl { url },
                }
            }
        })
        .collect();

    WireContent::Parts(converted)
}

fn encode_image(data: &ImageData) -> String {
    match data {
        ImageData::Bytes(bytes) => STANDARD.encode(bytes),
        ImageData::Base64(encoded) => encoded.clone(),
        ImageData::Opaque => {
            log::warn!("Unknown image data format, sending empty image payload");
            String::new()
        }
    }
}

/// Data URIs get long; logs keep the head and the length.
fn url_preview(url: &str) -> String {
    if url.len() > 100 {
        let head: String = url.chars().take(50).collect();
        format!("{}... ({} chars)", head, url.len())
    } else {
        url.to_string()
    }
}

/// Convert a message list to wire messages, preserving order.
pub fn convert_messages(messages: &[ChatMessage]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|msg| WireMessage {
            role: convert_role(msg.role()).to_string(),
            content: convert_content(msg.content()),
        })
        .collect()
}

/// Assemble a complete streaming request body.
///
/// `max_tokens` is always sent; callers resolve it from the per-request override
/// or the provider's configured ceiling before calling this.
pub fn build_request(
    model: &str,
    messages: &[ChatMessage],
    temperature: Option<f32>,
    max_tokens: u32,
    tools: &[ToolSpec],
) -> WireRequest {
    let (tools, tool_choice) = if tools.is_empty() {
        (None, None)
    } else {
        (
            Some(tools.iter().map(ToolSpec::to_wire_format).collect()),
            Some(ToolChoice::Auto),
        )
    };

    WireRequest {
        model: model.to_string(),
        messages: convert_messages(messages),
        stream: true,
        temperature,
        max_tokens,
        tools,
        tool_choice,
    }
}
