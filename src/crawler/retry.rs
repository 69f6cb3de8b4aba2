//! Retry policy with capped exponential backoff
//!
//! The policy knows nothing about HTTP: it re-runs an async operation until it
//! succeeds or the attempt budget is spent, sleeping between attempts.

use crate::config::FetcherConfig;
use crate::FetchError;
use std::future::Future;
use std::time::Duration;

/// Attempt budget and wait schedule for one logical request
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Wait after the first failed attempt
    pub min_wait: Duration,

    /// Longest wait between attempts
    pub max_wait: Duration,

    /// Growth factor applied to the wait after every further failure
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetcherConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            min_wait: Duration::from_millis(config.backoff_min_ms),
            max_wait: Duration::from_millis(config.backoff_max_ms),
            multiplier: config.backoff_multiplier,
        }
    }

    /// Wait before the attempt following failed attempt number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.min_wait.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_wait.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Runs `operation` until it succeeds or `max_attempts` is reached
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - The first successful result
    /// * `Err(FetchError::Exhausted)` - Every attempt failed; wraps the last error
    pub async fn run<T, F, Fut>(&self, url: &str, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts => {
                    return Err(FetchError::Exhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let wait = self.delay(attempt);
                    tracing::warn!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        url,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn policy(min_ms: u64, max_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            min_wait: Duration::from_millis(min_ms),
            max_wait: Duration::from_millis(max_ms),
            multiplier: 2.0,
        }
    }

    fn status_error() -> FetchError {
        FetchError::Status {
            url: "https://masonstores.com/x".to_string(),
            status: 503,
        }
    }

    #[test]
    fn test_exponential_growth() {
        let policy = policy(100, 10_000);
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
    }

    #[test]
    fn test_max_cap() {
        let policy = policy(5_000, 30_000);
        assert_eq!(policy.delay(3), Duration::from_millis(20_000));
        assert_eq!(policy.delay(4), Duration::from_millis(30_000));
        assert_eq!(policy.delay(40), Duration::from_millis(30_000));
    }

    #[test]
    fn test_defaults_follow_fetcher_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.min_wait, Duration::from_secs(5));
        assert_eq!(policy.max_wait, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = policy(1, 1)
            .run("https://masonstores.com/x", || {
                calls.set(calls.get() + 1);
                let attempt = calls.get();
                async move {
                    if attempt < 3 {
                        Err(status_error())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), FetchError> = policy(1, 1)
            .run("https://masonstores.com/x", || {
                calls.set(calls.get() + 1);
                async { Err(status_error()) }
            })
            .await;

        assert_eq!(calls.get(), 3);
        match result {
            Err(FetchError::Exhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, FetchError::Status { status: 503, .. }));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }
}
