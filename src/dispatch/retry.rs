use std::time::Duration;

use crate::dispatch::ModelTransport;
use crate::error::VerdictError;
use crate::limiter::RateLimiter;

/// Exponential backoff base.
pub const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Hard cap on any single backoff sleep.
pub const BACKOFF_CAP: Duration = Duration::from_secs(10);

/// Backoff to wait after the given 1-based failed attempt:
/// `min(base * 2^(attempt-1), cap)` — 1s, 2s, 4s, 8s, 10s, 10s, …
pub fn backoff_delay(failed_attempt: u32) -> Duration {
    let exp = failed_attempt.saturating_sub(1).min(30);
    BACKOFF_BASE.saturating_mul(1u32 << exp).min(BACKOFF_CAP)
}

/// Dispatch one prompt with bounded retry. Every attempt — including
/// retries — goes through the shared rate limiter first, so retries count
/// against the global call budget. Non-retryable errors surface immediately;
/// retryable ones are retried until `max_attempts` is exhausted, then the
/// last error is returned for the pipeline to convert into a fallback
/// review.
pub async fn call_with_retry<T: ModelTransport>(
    transport: &T,
    limiter: &RateLimiter,
    prompt: &str,
    max_tokens: u64,
    max_attempts: u32,
) -> Result<String, VerdictError> {
    let max_attempts = max_attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            let delay = backoff_delay(attempt - 1);
            tracing::warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "retrying after transient dispatch failure"
            );
            tokio::time::sleep(delay).await;
        }

        limiter.acquire().await;

        match transport.call_once(prompt, max_tokens).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                tracing::debug!(attempt, error = %e.user_message(), "dispatch attempt failed");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| VerdictError::Other("retry budget exhausted".to_string())))
}
