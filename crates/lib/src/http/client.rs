//! reqwest client wrapper that replays a request under a [`RetryPolicy`].

use crate::config::HttpConfig;
use crate::http::retry::{parse_retry_after, run_with_retry, should_retry_status, RetryPolicy};
use crate::http::HttpError;
use crate::shutdown::Shutdown;
use reqwest::header::{HeaderName, HeaderValue};
use std::time::Duration;

/// Correlates every attempt of one logical call.
pub const REQUEST_ID_HEADER: &str = "x-relay-request-id";
/// 0-based attempt index of the current try.
pub const RETRY_ATTEMPT_HEADER: &str = "x-relay-retry-attempt";

/// HTTP client with a finite per-request timeout and bounded retries.
#[derive(Clone)]
pub struct RetryClient {
    client: reqwest::Client,
    policy: RetryPolicy,
    /// Cuts retry waits short once triggered.
    shutdown: Option<Shutdown>,
}

impl RetryClient {
    pub fn new(config: &HttpConfig) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .build()
            .map_err(|e| HttpError::Request(e.to_string()))?;
        Ok(Self {
            client,
            policy: RetryPolicy::from_config(config),
            shutdown: None,
        })
    }

    pub fn with_client(client: reqwest::Client, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            shutdown: None,
        }
    }

    /// Stop waiting between retries once `shutdown` is triggered.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Underlying client, for building requests passed to [`RetryClient::execute`].
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request`, retrying transient failures. Returns the first 2xx response.
    ///
    /// Non-2xx statuses that are not retryable come back as [`HttpError::Protocol`]
    /// with the response body; exhausting the policy yields [`HttpError::RetriesExhausted`],
    /// and shutdown during a retry wait yields [`HttpError::Cancelled`].
    pub async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, HttpError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let label = format!(
            "{} {}{} [{}]",
            request.method(),
            request.url().host_str().unwrap_or(""),
            request.url().path(),
            request_id
        );
        run_with_retry(&self.policy, &label, self.shutdown.as_ref(), |attempt| {
            let replay = request.try_clone();
            let client = self.client.clone();
            let request_id = request_id.clone();
            async move {
                let mut req = replay.ok_or_else(|| {
                    HttpError::Request("request body cannot be replayed".to_string())
                })?;
                let headers = req.headers_mut();
                headers.insert(
                    HeaderName::from_static(REQUEST_ID_HEADER),
                    HeaderValue::from_str(&request_id)
                        .map_err(|e| HttpError::Request(e.to_string()))?,
                );
                headers.insert(
                    HeaderName::from_static(RETRY_ATTEMPT_HEADER),
                    HeaderValue::from(attempt),
                );
                let res = client.execute(req).await.map_err(classify_transport_error)?;
                classify_response(res).await
            }
        })
        .await
    }
}

fn classify_transport_error(error: reqwest::Error) -> HttpError {
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        HttpError::Transient {
            status: None,
            message: error.to_string(),
            retry_after: None,
        }
    } else {
        HttpError::Request(error.to_string())
    }
}

async fn classify_response(res: reqwest::Response) -> Result<reqwest::Response, HttpError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let retry_after = parse_retry_after(res.headers());
    let body = res.text().await.unwrap_or_default();
    if should_retry_status(status.as_u16()) {
        Err(HttpError::Transient {
            status: Some(status.as_u16()),
            message: format!("{} {}", status, body),
            retry_after,
        })
    } else {
        Err(HttpError::Protocol {
            status: status.as_u16(),
            body,
        })
    }
}
