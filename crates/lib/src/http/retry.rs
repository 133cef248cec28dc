//! Retry policy (attempt count + delay function) and the generic retry driver.

use crate::config::{BackoffKind, HttpConfig};
use crate::http::HttpError;
use crate::shutdown::Shutdown;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

/// Largest exponent applied to the base delay; keeps the shift from overflowing.
const MAX_BACKOFF_SHIFT: u32 = 16;

/// How many times to attempt a call and how long to wait between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Values below 1 are treated as 1.
    pub max_attempts: usize,
    pub backoff: BackoffKind,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(http: &HttpConfig) -> Self {
        Self {
            max_attempts: http.max_attempts,
            backoff: http.backoff,
            base_delay: Duration::from_millis(http.base_delay_ms),
            max_delay: Duration::from_millis(http.max_delay_ms),
        }
    }

    /// Delay to wait after the failed attempt with 0-based index `attempt`.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let delay = match self.backoff {
            BackoffKind::Constant => self.base_delay,
            BackoffKind::Exponential => {
                let shift = u32::try_from(attempt)
                    .unwrap_or(MAX_BACKOFF_SHIFT)
                    .min(MAX_BACKOFF_SHIFT);
                self.base_delay.saturating_mul(1_u32 << shift)
            }
        };
        delay.min(self.max_delay)
    }
}

/// True for statuses worth retrying: timeouts, rate limiting and server errors.
pub fn should_retry_status(status: u16) -> bool {
    status == 408 || status == 425 || status == 429 || status >= 500
}

/// Parse a `Retry-After` header given in seconds or as an HTTP date.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let retry_at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let delay_ms = retry_at.signed_duration_since(Utc::now()).num_milliseconds();
    Some(Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0)))
}

/// Wait before the attempt after `attempt`: the backoff delay raised to the
/// server's `Retry-After`, capped at `max_delay`.
pub fn retry_delay(policy: &RetryPolicy, attempt: usize, error: &HttpError) -> Duration {
    policy
        .delay_for(attempt)
        .max(error.retry_after().unwrap_or_default())
        .min(policy.max_delay)
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the policy's
/// attempts are used up. `op` receives the 0-based attempt index.
///
/// Transient errors sleep for the policy delay (or the server's `Retry-After`,
/// whichever is longer, never beyond `max_delay`) before the next attempt. When
/// every attempt failed transiently the result is [`HttpError::RetriesExhausted`]
/// wrapping the last cause. A triggered `shutdown` ends the wait early with
/// [`HttpError::Cancelled`].
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    shutdown: Option<&Shutdown>,
    mut op: F,
) -> Result<T, HttpError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, HttpError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last = HttpError::Request("no attempt made".to_string());
    for attempt in 0..max_attempts {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    log::info!("{}: succeeded on attempt {}/{}", label, attempt + 1, max_attempts);
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() => {
                log::warn!(
                    "{}: attempt {}/{} failed: {}",
                    label,
                    attempt + 1,
                    max_attempts,
                    e
                );
                if attempt + 1 < max_attempts {
                    let delay = retry_delay(policy, attempt, &e);
                    log::debug!("{}: retrying in {} ms", label, delay.as_millis());
                    let waited = match shutdown {
                        Some(shutdown) => shutdown.sleep(delay).await,
                        None => {
                            tokio::time::sleep(delay).await;
                            true
                        }
                    };
                    if !waited {
                        log::info!("{}: shutdown requested, abandoning retries", label);
                        return Err(HttpError::Cancelled {
                            attempts: attempt + 1,
                            last: Box::new(e),
                        });
                    }
                }
                last = e;
            }
            Err(e) => {
                log::warn!(
                    "{}: attempt {}/{} failed, not retrying: {}",
                    label,
                    attempt + 1,
                    max_attempts,
                    e
                );
                return Err(e);
            }
        }
    }
    Err(HttpError::RetriesExhausted {
        attempts: max_attempts,
        last: Box::new(last),
    })
}
