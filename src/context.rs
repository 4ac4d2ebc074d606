//! Token estimation
//!
//! A coarse, length-based heuristic: one token per four characters, rounded up.
//! It is not a tokenizer. Real counts differ by model family, so leave a safety
//! margin when comparing against a context window.
//!
//! # Examples
//!
//! ```rust
//! use flowchat::{ChatMessage, estimate_tokens};
//!
//! assert_eq!(estimate_tokens("Hello world"), 3);
//! assert_eq!(estimate_tokens(&ChatMessage::user("abcd")), 1);
//! ```

use crate::types::{ChatMessage, ContentPart};

/// What to estimate: bare text or a whole message.
#[derive(Debug, Clone, Copy)]
pub enum TokenInput<'a> {
    Text(&'a str),
    Message(&'a ChatMessage),
}

impl<'a> From<&'a str> for TokenInput<'a> {
    fn from(text: &'a str) -> Self {
        TokenInput::Text(text)
    }
}

impl<'a> From<&'a String> for TokenInput<'a> {
    fn from(text: &'a String) -> Self {
        TokenInput::Text(text)
    }
}

impl<'a> From<&'a ChatMessage> for TokenInput<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        TokenInput::Message(message)
    }
}

/// Estimate the token count of text or a message.
///
/// For a message only text parts count; images contribute nothing.
pub fn estimate_tokens<'a>(input: impl Into<TokenInput<'a>>) -> usize {
    let chars = match input.into() {
        TokenInput::Text(text) => text.chars().count(),
        TokenInput::Message(message) => message
            .content()
            .iter()
            .map(|part| match part {
                ContentPart::Text(value) => value.chars().count(),
                ContentPart::Image { .. } => 0,
            })
            .sum(),
    };
    chars.div_ceil(4)
}

/// Sum of per-message estimates.
pub fn estimate_messages(messages: &[ChatMessage]) -> usize {
    messages.iter().map(|message| estimate_tokens(message)).sum()
}

/// `true` if the estimate for `messages` exceeds `limit * margin`.
///
/// ```rust
/// use flowchat::{ChatMessage, is_approaching_limit};
///
/// let history = vec![ChatMessage::user("x".repeat(1000))];
/// assert!(!is_approaching_limit(&history, 1000, 0.9));
/// assert!(is_approaching_limit(&history, 200, 0.9));
/// ```
pub fn is_approaching_limit(messages: &[ChatMessage], limit: usize, margin: f32) -> bool {
    let threshold = (limit as f32 * margin) as usize;
    estimate_messages(messages) > threshold
}
