//! Tests for the rate limiter and retry/backoff, on a paused tokio clock.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use verdict::dispatch::retry::{backoff_delay, call_with_retry};
use verdict::dispatch::ModelTransport;
use verdict::error::VerdictError;
use verdict::limiter::RateLimiter;

/// Transport that replays a scripted sequence of results.
struct ScriptedTransport {
    script: Mutex<VecDeque<Result<String, VerdictError>>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<String, VerdictError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }

    fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl ModelTransport for ScriptedTransport {
    async fn call_once(&self, _prompt: &str, _max_tokens: u64) -> Result<String, VerdictError> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted transport exhausted")
    }
}

fn timeout_err() -> VerdictError {
    VerdictError::Timeout(1000)
}

// ---------------------------------------------------------------------------
// RateLimiter: trailing-window ceiling
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn third_call_waits_out_the_window() {
    let limiter = RateLimiter::new(Duration::ZERO, 2);
    let t0 = tokio::time::Instant::now();

    limiter.acquire().await;
    limiter.acquire().await;
    assert!(t0.elapsed() < Duration::from_secs(1));

    // Window holds 2: the third acquisition must wait until the first
    // timestamp leaves the trailing 60s window.
    limiter.acquire().await;
    assert!(t0.elapsed() >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn min_interval_spaces_consecutive_calls() {
    let limiter = RateLimiter::new(Duration::from_millis(1000), 100);
    let t0 = tokio::time::Instant::now();

    limiter.acquire().await;
    limiter.acquire().await;
    limiter.acquire().await;

    assert!(t0.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn concurrent_acquirers_serialize() {
    let limiter = Arc::new(RateLimiter::new(Duration::from_millis(1000), 100));
    let t0 = tokio::time::Instant::now();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let limiter = limiter.clone();
        handles.push(tokio::spawn(async move {
            limiter.acquire().await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Four calls spaced at least 1s apart: no two callers slipped through
    // the critical section together.
    assert!(t0.elapsed() >= Duration::from_secs(3));
    assert_eq!(limiter.calls_in_window().await, 4);
}

// ---------------------------------------------------------------------------
// Backoff schedule
// ---------------------------------------------------------------------------

#[test]
fn backoff_schedule_is_exponential_with_cap() {
    let secs: Vec<u64> = (1..=7).map(|a| backoff_delay(a).as_secs()).collect();
    assert_eq!(secs, vec![1, 2, 4, 8, 10, 10, 10]);
}

// ---------------------------------------------------------------------------
// call_with_retry
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn first_attempt_success_needs_no_backoff() {
    let transport = ScriptedTransport::new(vec![Ok("fine".to_string())]);
    let limiter = RateLimiter::new(Duration::ZERO, 100);
    let t0 = tokio::time::Instant::now();

    let out = call_with_retry(&transport, &limiter, "p", 1024, 3).await.unwrap();
    assert_eq!(out, "fine");
    assert!(t0.elapsed() < Duration::from_millis(10));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_with_backoff() {
    let transport = ScriptedTransport::new(vec![
        Err(timeout_err()),
        Err(timeout_err()),
        Ok("third time lucky".to_string()),
    ]);
    let limiter = RateLimiter::new(Duration::ZERO, 100);
    let t0 = tokio::time::Instant::now();

    let out = call_with_retry(&transport, &limiter, "p", 1024, 3).await.unwrap();
    assert_eq!(out, "third time lucky");
    // Backoffs: 1s then 2s.
    assert!(t0.elapsed() >= Duration::from_secs(3));
    assert_eq!(transport.remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn non_retryable_error_stops_immediately() {
    let transport = ScriptedTransport::new(vec![
        Err(VerdictError::AuthFailed {
            provider: "api.example.com".to_string(),
            message: "401 Unauthorized".to_string(),
        }),
        Ok("never reached".to_string()),
    ]);
    let limiter = RateLimiter::new(Duration::ZERO, 100);

    let out = call_with_retry(&transport, &limiter, "p", 1024, 5).await;
    assert!(matches!(out, Err(VerdictError::AuthFailed { .. })));
    assert_eq!(transport.remaining(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_return_last_error() {
    let transport = ScriptedTransport::new(vec![
        Err(timeout_err()),
        Err(timeout_err()),
        Err(timeout_err()),
    ]);
    let limiter = RateLimiter::new(Duration::ZERO, 100);

    let out = call_with_retry(&transport, &limiter, "p", 1024, 3).await;
    assert!(matches!(out, Err(VerdictError::Timeout(_))));
    assert_eq!(transport.remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn every_attempt_counts_against_the_rate_limit() {
    let transport = ScriptedTransport::new(vec![
        Err(timeout_err()),
        Err(timeout_err()),
        Ok("ok".to_string()),
    ]);
    let limiter = RateLimiter::new(Duration::ZERO, 100);

    call_with_retry(&transport, &limiter, "p", 1024, 3).await.unwrap();
    assert_eq!(limiter.calls_in_window().await, 3);
}

#[tokio::test(start_paused = true)]
async fn five_xx_is_retryable() {
    let transport = ScriptedTransport::new(vec![
        Err(VerdictError::Upstream {
            provider: "api.example.com".to_string(),
            message: "502 Bad Gateway".to_string(),
            status: Some(502),
        }),
        Ok("recovered".to_string()),
    ]);
    let limiter = RateLimiter::new(Duration::ZERO, 100);

    let out = call_with_retry(&transport, &limiter, "p", 1024, 2).await.unwrap();
    assert_eq!(out, "recovered");
}

#[tokio::test(start_paused = true)]
async fn four_xx_is_not_retryable() {
    let transport = ScriptedTransport::new(vec![
        Err(VerdictError::Upstream {
            provider: "api.example.com".to_string(),
            message: "400 Bad Request".to_string(),
            status: Some(400),
        }),
        Ok("never reached".to_string()),
    ]);
    let limiter = RateLimiter::new(Duration::ZERO, 100);

    let out = call_with_retry(&transport, &limiter, "p", 1024, 5).await;
    assert!(out.is_err());
    assert_eq!(transport.remaining(), 1);
}
