//! Retry Logic
//!
//! Bounded retry with exponential backoff for transient generation failures.
//! Errors that another attempt cannot fix short-circuit on the first failure.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use course_generation_gate::resilience::RetryPolicy;
//!
//! let policy = RetryPolicy::exponential(3, Duration::from_secs(1));
//!
//! let raw = policy.call_with_retry(|| async {
//!     generator.generate(&prompt).await
//! }).await?;
//! ```

use crate::config::RetryConfig;
use crate::metrics;
use std::time::Duration;
use tracing::{debug, warn};

/// Classifies an error as transient or terminal.
pub trait Retryable {
    /// `true` if another attempt might succeed.
    fn is_retryable(&self) -> bool;
}

/// Retry policy configuration
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves as one.
    pub max_attempts: usize,
    /// Delay schedule between attempts.
    pub strategy: RetryStrategy,
}

/// Retry backoff strategy
#[derive(Clone, Debug, PartialEq)]
pub enum RetryStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Exponential backoff, capped at `max_delay`
    Exponential {
        /// Delay after the first failure.
        initial_delay: Duration,
        /// Upper bound for any single delay.
        max_delay: Duration,
        /// Growth factor per attempt.
        multiplier: f64,
    },
}

impl Default for RetryPolicy {
    /// Three attempts, 1s doubling backoff capped at 5s.
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Create policy with fixed delay
    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            strategy: RetryStrategy::Fixed(delay),
        }
    }

    /// Create policy with doubling backoff capped at five seconds
    pub fn exponential(max_attempts: usize, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            strategy: RetryStrategy::Exponential {
                initial_delay,
                max_delay: Duration::from_secs(5),
                multiplier: 2.0,
            },
        }
    }

    /// Build the policy described by a [`RetryConfig`].
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            strategy: RetryStrategy::Exponential {
                initial_delay: Duration::from_millis(config.initial_delay_ms),
                max_delay: Duration::from_millis(config.max_delay_ms),
                multiplier: config.multiplier,
            },
        }
    }

    /// Run `f` until it succeeds, fails with a non-retryable error, or
    /// `max_attempts` attempts have been made.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last error once attempts
    /// are exhausted.
    pub async fn call_with_retry<F, Fut, T, E>(&self, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            debug!(attempt, max = max_attempts, "retry: attempting operation");

            match f().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(attempt, "retry: operation succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(e) if !e.is_retryable() => {
                    warn!(attempt, error = %e, "retry: error is not retryable");
                    return Err(e);
                }
                Err(e) => {
                    if attempt >= max_attempts {
                        warn!(attempts = attempt, error = %e, "retry: all attempts exhausted");
                        return Err(e);
                    }

                    let delay = self.delay_after(attempt);
                    warn!(
                        attempt,
                        max = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retry: operation failed, backing off"
                    );
                    metrics::inc_retry();
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Delay slept after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: usize) -> Duration {
        match &self.strategy {
            RetryStrategy::Fixed(delay) => *delay,
            RetryStrategy::Exponential {
                initial_delay,
                max_delay,
                multiplier,
            } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
                let delay = initial_delay.as_millis() as f64 * multiplier.powi(exponent);
                let capped = delay.min(max_delay.as_millis() as f64);
                Duration::from_millis(capped as u64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GenerationError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Flaky(bool);

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky(retryable={})", self.0)
        }
    }

    impl Retryable for Flaky {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_eventually() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let policy = RetryPolicy::exponential(5, Duration::from_millis(1000));

        let result = policy
            .call_with_retry(|| {
                let attempts = attempts_clone.clone();
                async move {
                    let count = attempts.fetch_add(1, Ordering::SeqCst);
                    if count < 2 {
                        Err(Flaky(true))
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_makes_at_most_max_attempts() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let policy = RetryPolicy::default();

        let result = policy
            .call_with_retry(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(Flaky(true))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_short_circuits_after_one_attempt() {
        for err in [
            GenerationError::Authentication("bad key".into()),
            GenerationError::RateLimit {
                message: "429".into(),
                retry_after: None,
            },
            GenerationError::validation("missing topic"),
        ] {
            let attempts = Arc::new(AtomicUsize::new(0));
            let counter = attempts.clone();
            let expected = err.clone();
            let result = RetryPolicy::default()
                .call_with_retry(|| {
                    let counter = counter.clone();
                    let err = err.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(err)
                    }
                })
                .await;
            assert_eq!(result.unwrap_err(), expected);
            assert_eq!(attempts.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_error_returned_when_exhausted() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let result = RetryPolicy::exponential(2, Duration::from_millis(10))
            .call_with_retry(|| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(GenerationError::service("transport", format!("try {n}")))
                }
            })
            .await;
        assert_eq!(
            result.unwrap_err(),
            GenerationError::service("transport", "try 1")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_one_then_two_seconds() {
        let start = tokio::time::Instant::now();
        let _ = RetryPolicy::default()
            .call_with_retry(|| async { Err::<(), _>(Flaky(true)) })
            .await;
        // attempts at t=0, t=1s, t=3s
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3000), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(3100), "elapsed {elapsed:?}");
    }

    #[test]
    fn test_exponential_backoff_caps_at_five_seconds() {
        let policy = RetryPolicy::exponential(10, Duration::from_millis(1000));

        let delays: Vec<u128> = (1..=6).map(|k| policy.delay_after(k).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000, 5000]);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = RetryPolicy::exponential(10, Duration::from_millis(1000));
        assert_eq!(policy.delay_after(10_000), Duration::from_secs(5));
    }

    #[test]
    fn test_fixed_delay_constant() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(250));
        assert_eq!(policy.delay_after(1), Duration::from_millis(250));
        assert_eq!(policy.delay_after(3), Duration::from_millis(250));
    }

    #[test]
    fn test_from_config_uses_configured_cap() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 300,
            multiplier: 3.0,
        });
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(300));
        assert_eq!(policy.delay_after(3), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_zero_max_attempts_still_runs_once() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let result = RetryPolicy::fixed(0, Duration::ZERO)
            .call_with_retry(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Flaky>(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
