//! Bounded exponential-backoff retries for fetch and analysis calls.

use crate::error::{RetryError, Retryable};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry settings shared by every fetch and analyze call of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` total attempts, doubling from `initial_delay`.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.0,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Randomise each delay by up to `jitter` (0.0..=1.0) of its value.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Upper bound on the total time spent sleeping between attempts.
    pub fn worst_case_delay(&self) -> Duration {
        let mut total = Duration::ZERO;
        let mut current = self.initial_delay;
        for _ in 1..self.max_attempts {
            let capped = current.min(self.max_delay);
            total += capped.mul_f64(1.0 + self.jitter);
            current = current.mul_f64(self.multiplier);
        }
        total
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_delay,
            initial_interval: self.initial_delay,
            randomization_factor: self.jitter,
            multiplier: self.multiplier,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Retryable + 'static,
    {
        let mut backoff = self.backoff();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    debug!(operation, attempt, error = %e, "Non-retryable failure");
                    return Err(RetryError::NonRetryable {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) if attempt >= self.max_attempts => {
                    warn!(operation, attempts = attempt, error = %e, "Retries exhausted");
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    let delay = backoff.next_backoff().unwrap_or(self.max_delay);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl From<&crate::config::RetryConfig> for RetryPolicy {
    fn from(config: &crate::config::RetryConfig) -> Self {
        RetryPolicy::new(config.max_attempts, Duration::from_millis(config.initial_delay_ms))
            .with_multiplier(config.multiplier)
            .with_max_delay(Duration::from_millis(config.max_delay_ms))
            .with_jitter(config.jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn timeout() -> FetchError {
        FetchError::Timeout {
            target: "https://example.com".to_string(),
        }
    }

    /// Fails with a timeout for the first `failures` calls, then succeeds.
    async fn flaky(calls: &AtomicU32, failures: u32) -> Result<&'static str, FetchError> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= failures {
            Err(timeout())
        } else {
            Ok("content")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_when_budget_covers_failures() {
        let k = 2;
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(k + 1, Duration::from_millis(1000));

        let result = policy.run("fetch", |_| flaky(&calls, k)).await;

        assert_eq!(result, Ok("content"));
        assert_eq!(calls.load(Ordering::SeqCst), k + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_after_exactly_max_attempts() {
        let k = 3;
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(k, Duration::from_millis(1000));

        let err = policy.run("fetch", |_| flaky(&calls, k)).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), k);
        assert_eq!(err.attempts(), k);
        assert_eq!(
            err,
            RetryError::Exhausted {
                attempts: k,
                source: timeout()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(10));

        let err = policy
            .run("fetch", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(FetchError::InvalidTarget {
                        target: "nope".to_string(),
                        reason: "relative URL".to_string(),
                    })
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, RetryError::NonRetryable { attempts: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_grow_exponentially() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));
        let mut stamps = Vec::new();

        let _ = policy
            .run("analyze", |_| {
                stamps.push(Instant::now());
                async { Err::<(), _>(timeout()) }
            })
            .await;

        assert_eq!(stamps.len(), 3);
        assert_eq!(stamps[1] - stamps[0], Duration::from_millis(1000));
        assert_eq!(stamps[2] - stamps[1], Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_numbers_are_passed_through() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let mut seen = Vec::new();

        let _ = policy
            .run("fetch", |attempt| {
                seen.push(attempt);
                async { Err::<(), _>(timeout()) }
            })
            .await;

        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_worst_case_delay() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));
        assert_eq!(policy.worst_case_delay(), Duration::from_millis(3000));

        let capped = RetryPolicy::new(4, Duration::from_millis(1000))
            .with_max_delay(Duration::from_millis(1500));
        assert_eq!(capped.worst_case_delay(), Duration::from_millis(4000));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }
}
