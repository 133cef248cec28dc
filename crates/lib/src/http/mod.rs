//! Outbound HTTP with bounded retries.
//!
//! Every call to the chat platform and to the generation service goes through
//! [`RetryClient`], which retries transient failures (connection errors,
//! timeouts, 408/425/429 and 5xx) with a configurable backoff and gives up
//! immediately on other client errors.

mod client;
mod retry;

pub use client::RetryClient;
pub use retry::{parse_retry_after, retry_delay, run_with_retry, should_retry_status, RetryPolicy};

use std::time::Duration;

/// Failure of an outbound HTTP call.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Connection error, timeout or retryable status. Retried by [`run_with_retry`].
    #[error("transient network error: {message}")]
    Transient {
        status: Option<u16>,
        message: String,
        retry_after: Option<Duration>,
    },
    /// Non-retryable error status (4xx other than rate limiting).
    #[error("protocol error: {status} {body}")]
    Protocol { status: u16, body: String },
    /// The request could not be built or replayed.
    #[error("request error: {0}")]
    Request(String),
    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: usize,
        last: Box<HttpError>,
    },
    /// Shutdown arrived while waiting to retry.
    #[error("cancelled by shutdown after {attempts} attempt(s): {last}")]
    Cancelled {
        attempts: usize,
        last: Box<HttpError>,
    },
}

impl HttpError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, HttpError::Transient { .. })
    }

    /// Server-requested minimum wait before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            HttpError::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// HTTP status carried by the error (the last attempt's for exhausted retries).
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Transient { status, .. } => *status,
            HttpError::Protocol { status, .. } => Some(*status),
            HttpError::Request(_) => None,
            HttpError::RetriesExhausted { last, .. } | HttpError::Cancelled { last, .. } => {
                last.status()
            }
        }
    }
}
