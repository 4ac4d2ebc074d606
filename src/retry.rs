//! Caller-side retry with exponential backoff
//!
//! The provider never retries on its own: a request either yields a response or
//! fails once. Hosts that want retries wrap `send_chat_request` in one of these
//! helpers. Only the request phase is worth retrying; once events are flowing,
//! a failure is reported in the stream.
//!
//! ```rust,no_run
//! use flowchat::retry::{RetryConfig, retry_with_backoff_conditional};
//! use flowchat::{ChatMessage, ChatProvider, RequestOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(provider: &ChatProvider) -> flowchat::Result<()> {
//! let messages = vec![ChatMessage::user("Hello")];
//! let response = retry_with_backoff_conditional(RetryConfig::default(), || {
//!     provider.send_chat_request(
//!         "",
//!         "example",
//!         &messages,
//!         RequestOptions::new(),
//!         CancellationToken::new(),
//!     )
//! })
//! .await?;
//! let collected = response.collect().await;
//! println!("{}", collected.text);
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Backoff schedule.
///
/// The wait before retry `n` (0-based) is `initial_delay * backoff_multiplier^n`,
/// capped at `max_delay`, then spread by up to `jitter_factor / 2` either way.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, the first one included. Zero behaves like one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// 0.0 to 1.0
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Clamped to `0.0..=1.0`.
    pub fn with_jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = jitter.clamp(0.0, 1.0);
        self
    }

    /// Un-jittered wait before retry `retry` (0-based).
    fn base_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    fn delay_for(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if self.jitter_factor == 0.0 {
            return base;
        }
        let spread = rand::thread_rng().gen_range(-0.5..=0.5) * self.jitter_factor;
        base.mul_f64((1.0 + spread).max(0.0))
    }
}

/// Classify an error as transient.
///
/// Retryable: 429 and 5xx responses, network failures, header timeouts, body read
/// and stream failures. Not retryable: other statuses (401 and friends), missing
/// configuration, invalid input, cancellation.
pub fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Api { status, .. } => *status == 429 || (500..600).contains(status),
        Error::Http(e) => e
            .status()
            .is_none_or(|status| status.as_u16() == 429 || status.is_server_error()),
        Error::Timeout | Error::Io(_) | Error::Stream(_) => true,
        Error::Config(_)
        | Error::InvalidInput(_)
        | Error::Cancelled
        | Error::Json(_)
        | Error::Secret(_)
        | Error::Other(_) => false,
    }
}

/// Run `operation` until it succeeds, `should_retry` rejects the error, or the
/// attempts run out. The last error is returned.
pub async fn retry_when<F, Fut, T, P>(
    config: RetryConfig,
    mut operation: F,
    should_retry: P,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts || !should_retry(&err) => return Err(err),
            Err(err) => {
                let delay = config.delay_for(attempt - 1);
                log::warn!(
                    "Attempt {}/{} failed: {}; retrying in {:?}",
                    attempt,
                    attempts,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Retry on every error.
pub async fn retry_with_backoff<F, Fut, T>(config: RetryConfig, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_when(config, operation, |_| true).await
}

/// Retry only errors [`is_retryable_error`] accepts.
pub async fn retry_with_backoff_conditional<F, Fut, T>(config: RetryConfig, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_when(config, operation, is_retryable_error).await
}
