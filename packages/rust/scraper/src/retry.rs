//! Retry with exponential backoff and jitter.
//!
//! [`RetryPolicy`] is a reusable policy object wrapping any fallible async
//! operation, parameterized by attempt count and base delay. Call sites
//! stay free of backoff arithmetic.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Retry policy: up to `max_attempts` total attempts, sleeping
/// `base_delay * 2^(k-1) + uniform(0, 1)` seconds before attempt `k`.
///
/// Every error is treated as retryable; there is no transient/permanent
/// distinction, so permanent failures burn the full attempt budget before
/// surfacing.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Run `op`, retrying on failure until the attempt budget is spent.
    /// The final attempt's error is returned unmodified.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }
                    let delay = self.delay_before(attempt);
                    warn!(
                        label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Backoff before attempt `attempt` (1-indexed here: the first retry).
    fn delay_before(&self, attempt: u32) -> Duration {
        let floor = self.base_delay.as_secs_f64() * 2f64.powi(attempt as i32 - 1);
        let jitter: f64 = rand::rng().random_range(0.0..1.0);
        Duration::from_secs_f64(floor + jitter)
    }
}
