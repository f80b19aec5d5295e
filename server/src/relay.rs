//! Forwards broadcast events to an external webhook.

use futures::{future::BoxFuture, FutureExt};
use reqwest::Client as HttpClient;
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tombola_engine::{Relay, RelayError};
use tombola_types::{api::Broadcast, Stake};
use tracing::debug;
use url::Url;

/// Timeout for a single delivery attempt
const TIMEOUT: Duration = Duration::from_secs(10);

/// Retry policy for transient webhook failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per event (including the first attempt).
    pub max_attempts: usize,
    /// Initial backoff delay after the first retryable failure.
    pub initial_backoff: Duration,
    /// Maximum backoff delay between attempts.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    stake: Stake,
    #[serde(flatten)]
    event: &'a Broadcast,
}

/// POSTs every event as JSON to a fixed URL.
#[derive(Clone)]
pub struct WebhookRelay {
    url: Url,
    http_client: HttpClient,
    retry_policy: RetryPolicy,
}

impl WebhookRelay {
    pub fn new(url: Url) -> Result<Self, reqwest::Error> {
        let http_client = HttpClient::builder().timeout(TIMEOUT).build()?;
        Ok(Self {
            url,
            http_client,
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Returns a new relay with the provided retry policy.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    async fn send_with_retry(&self, body: Vec<u8>) -> Result<(), RelayError> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt = 0usize;
        let mut backoff = self.retry_policy.initial_backoff;
        loop {
            attempt += 1;
            let result = self
                .http_client
                .post(self.url.clone())
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send()
                .await;
            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(());
                    }
                    if !is_retryable_status(status) || attempt >= max_attempts {
                        return Err(RelayError(format!("webhook returned {status}")));
                    }
                    debug!(attempt, %status, "webhook delivery failed, retrying");
                }
                Err(err) => {
                    if attempt >= max_attempts || !is_retryable_error(&err) {
                        return Err(RelayError(err.to_string()));
                    }
                    debug!(attempt, error = %err, "webhook delivery failed, retrying");
                }
            }

            if backoff > Duration::ZERO {
                sleep(backoff).await;
                backoff = std::cmp::min(backoff.saturating_mul(2), self.retry_policy.max_backoff);
            }
        }
    }
}

impl Relay for WebhookRelay {
    fn deliver(&self, stake: Stake, event: Broadcast) -> BoxFuture<'static, Result<(), RelayError>> {
        let body = serde_json::to_vec(&Envelope {
            stake,
            event: &event,
        });
        let relay = self.clone();
        async move {
            let body = body.map_err(|e| RelayError(e.to_string()))?;
            relay.send_with_retry(body).await
        }
        .boxed()
    }
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    use reqwest::StatusCode;
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}
