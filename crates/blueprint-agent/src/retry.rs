use crate::backends::GenerationClient;
use crate::stream::{GenerationRequest, TextStream};
use async_trait::async_trait;
use blueprint_core::{BlueprintError, BlueprintResult, Credentials};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Configures retry behaviour at the network-client boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub backoff_base_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential backoff).
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

/// Determines whether an error is transient and worth retrying.
///
/// Rate limits (429), server errors (5xx), timeouts and connection failures
/// are transient. Every other status (400, 401, 403, ...) and every non-HTTP
/// error is final.
pub fn is_retryable(err: &BlueprintError) -> bool {
    let BlueprintError::Http(msg) = err else {
        return false;
    };
    if let Some(status) = status_code(msg) {
        return status == 429 || (500..600).contains(&status);
    }
    let lower = msg.to_lowercase();
    lower.contains("timeout") || lower.contains("timed out") || lower.contains("connection")
}

/// Status code from an "... API error 503: ..." message.
fn status_code(msg: &str) -> Option<u16> {
    let rest = &msg[msg.find("API error ")? + "API error ".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Exponential backoff for `attempt` (0-based), capped at `backoff_max_ms`.
pub fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> u64 {
    let delay = policy
        .backoff_base_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    delay.min(policy.backoff_max_ms)
}

/// A `GenerationClient` that retries transient failures of the wrapped client.
///
/// Only establishing the stream is retried; an error surfacing mid-stream is
/// passed through to the consumer.
pub struct RetryingClient {
    inner: Arc<dyn GenerationClient>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn GenerationClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl GenerationClient for RetryingClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
        credentials: &Credentials,
    ) -> BlueprintResult<TextStream> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(request, credentials).await {
                Ok(stream) => return Ok(stream),
                Err(e) if is_retryable(&e) && attempt < self.policy.max_retries => {
                    let delay = compute_backoff(&self.policy, attempt);
                    info!(
                        attempt,
                        delay_ms = delay,
                        error = %e,
                        "Retryable generation error, backing off"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Generation failed");
                    return Err(e);
                }
            }
        }
    }
}
