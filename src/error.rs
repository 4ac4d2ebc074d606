//! Error types for the flowchat SDK

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the SDK
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error (connection refused, DNS, body read failure)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while draining a pull-style response body
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration, including a missing credential
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Non-success status returned by the vendor API
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Terminal failure reported by the underlying response stream
    #[error("Streaming error: {0}")]
    Stream(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Secret store failure
    #[error("Secret store error: {0}")]
    Secret(String),

    /// Timed out waiting for response headers
    #[error("Request timeout")]
    Timeout,

    /// Cancelled before the response headers arrived
    #[error("Request cancelled")]
    Cancelled,

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new API error from a status code and response body
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Error::Api {
            status,
            body: body.into(),
        }
    }

    /// Create a new stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new secret store error
    pub fn secret(msg: impl Into<String>) -> Self {
        Error::Secret(msg.into())
    }

    /// Create a new other error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a timeout error
    pub fn timeout() -> Self {
        Error::Timeout
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether this error belongs to the transport class (status, network, timeout).
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Api { .. } | Error::Http(_) | Error::Timeout)
    }
}
