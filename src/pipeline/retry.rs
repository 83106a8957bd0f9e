//! Bounded retry with exponential backoff.
//!
//! Used around whole detail-page loads: an attempt that fails with a
//! transient error (an element that never appeared, a mandatory field that
//! came back empty) is retried by reloading the page, up to `max_attempts`
//! loads in total. Any other error is returned at once.

use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::ExtractionConfig;

/// Retry policy for page loads.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Multiplier applied to the delay after each further attempt
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Reload after the given delay
    Retry { after: Duration },
    /// Surface the error
    GiveUp,
}

impl RetryPolicy {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.backoff_ms),
            factor: config.backoff_factor.max(1.0),
        }
    }

    /// Single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            factor: 1.0,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.factor.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Decide whether attempt number `attempt` that failed with `error` is retried.
    pub fn decide(&self, attempt: u32, error: &AppError) -> RetryDecision {
        if attempt >= self.max_attempts || !error.is_transient() {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            after: self.backoff_for(attempt),
        }
    }

    /// Run `op` until it succeeds or the policy gives up.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => match self.decide(attempt, &error) {
                    RetryDecision::Retry { after } => {
                        log::warn!(
                            "Attempt {}/{} failed ({}), retrying in {:?}",
                            attempt,
                            self.max_attempts,
                            error,
                            after
                        );
                        tokio::time::sleep(after).await;
                        attempt += 1;
                    }
                    RetryDecision::GiveUp => return Err(error),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            factor: 2.0,
        }
    }

    fn empty_description(attempt: u32) -> AppError {
        AppError::TransientExtractionFailure {
            url: "https://letterboxd.com/film/ratatouille/".to_string(),
            attempts: attempt,
        }
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(100),
            factor: 2.0,
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(1000),
            factor: f64::INFINITY,
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_for(2), Duration::MAX);

        let huge = RetryPolicy {
            factor: 1e300,
            ..policy.clone()
        };
        assert_eq!(huge.backoff_for(u32::MAX), Duration::MAX);

        let immediate = RetryPolicy {
            initial_backoff: Duration::ZERO,
            ..policy
        };
        assert_eq!(immediate.backoff_for(3), Duration::ZERO);
    }

    #[test]
    fn test_non_transient_errors_are_not_retried() {
        let policy = fast(5);
        let decision = policy.decide(1, &AppError::malformed("year", "x"));
        assert_eq!(decision, RetryDecision::GiveUp);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = fast(3)
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(empty_description(attempt))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast(2)
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(empty_description(attempt)) }
            })
            .await;
        assert!(matches!(
            result,
            Err(AppError::TransientExtractionFailure { attempts: 2, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
