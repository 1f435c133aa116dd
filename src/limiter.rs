use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep, sleep_until};

/// Trailing window over which the call ceiling is enforced.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Shared call-rate state. Mutated on every dispatch attempt, including
/// retries; never reset except by dropping the limiter.
struct LimiterState {
    last_call_at: Option<Instant>,
    call_history: VecDeque<Instant>,
}

/// Throttles outbound model calls. Two independent constraints, both
/// enforced: at most `max_per_window` calls in any trailing 60s window, and
/// at least `min_interval` between consecutive calls.
///
/// `acquire` never fails, only delays. The mutex is held across the whole
/// check-sleep-record sequence so two concurrent callers cannot both observe
/// "under capacity" and both proceed.
pub struct RateLimiter {
    min_interval: Duration,
    max_per_window: usize,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, max_per_window: usize) -> Self {
        Self {
            min_interval,
            max_per_window: max_per_window.max(1),
            state: Mutex::new(LimiterState {
                last_call_at: None,
                call_history: VecDeque::new(),
            }),
        }
    }

    /// Block until it is safe to issue one more call, then record it.
    /// The timestamp is appended only after both waits are satisfied.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        while let Some(oldest) = state.call_history.front() {
            if now.duration_since(*oldest) >= RATE_WINDOW {
                state.call_history.pop_front();
            } else {
                break;
            }
        }

        if state.call_history.len() >= self.max_per_window
            && let Some(oldest) = state.call_history.front().copied()
        {
            let wake = oldest + RATE_WINDOW;
            if wake > Instant::now() {
                let wait_ms = (wake - Instant::now()).as_millis() as u64;
                tracing::debug!(wait_ms, "rate window full, waiting");
                sleep_until(wake).await;
            }
            state.call_history.pop_front();
        }

        if let Some(last) = state.last_call_at {
            let since = Instant::now().duration_since(last);
            if since < self.min_interval {
                sleep(self.min_interval - since).await;
            }
        }

        let stamp = Instant::now();
        state.last_call_at = Some(stamp);
        state.call_history.push_back(stamp);
    }

    /// Number of calls currently inside the trailing window (for testing).
    pub async fn calls_in_window(&self) -> usize {
        let state = self.state.lock().await;
        let now = Instant::now();
        state
            .call_history
            .iter()
            .filter(|t| now.duration_since(**t) < RATE_WINDOW)
            .count()
    }
}
