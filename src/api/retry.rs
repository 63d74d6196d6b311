// src/api/retry.rs

//! Retry with exponential backoff and jitter for fallible async operations.

use std::future::Future;

use rand::Rng;
use tokio::time::Duration;

use crate::error::{AppError, Result};

/// Retry policy for transient failures.
///
/// Runs an operation up to `max_attempts` times total (first try included),
/// sleeping `backoff_factor^attempt` seconds between tries with symmetric
/// random jitter of `jitter * delay`. A rate-limit error carrying a
/// `Retry-After` hint sleeps that hint instead of the computed backoff.
/// Errors outside the retryable set propagate immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_factor: f64,
    jitter: f64,
    retryable: fn(&AppError) -> bool,
}

impl RetryPolicy {
    /// Create a retry policy retrying transient errors.
    pub fn new(max_attempts: u32, backoff_factor: f64, jitter: f64) -> Result<Self> {
        if max_attempts < 1 {
            return Err(AppError::invalid_argument(format!(
                "max_attempts must be at least 1, got {max_attempts}"
            )));
        }
        if backoff_factor <= 0.0 {
            return Err(AppError::invalid_argument(format!(
                "backoff_factor must be greater than 0, got {backoff_factor}"
            )));
        }
        if !(0.0..=1.0).contains(&jitter) {
            return Err(AppError::invalid_argument(format!(
                "jitter must be within [0, 1], got {jitter}"
            )));
        }

        Ok(Self {
            max_attempts,
            backoff_factor,
            jitter,
            retryable: AppError::is_transient,
        })
    }

    /// Replace the retryable-error predicate.
    pub fn retry_on(mut self, retryable: fn(&AppError) -> bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Total attempts (first try included).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds, fails non-retryably, or attempts run out.
    ///
    /// The final error is returned unchanged after the last attempt.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !(self.retryable)(&error) {
                        return Err(error);
                    }
                    if attempt + 1 >= self.max_attempts {
                        log::error!(
                            "Final attempt {}/{} failed: {}",
                            attempt + 1,
                            self.max_attempts,
                            error
                        );
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt, &error);
                    log::warn!(
                        "Attempt {}/{} failed ({}). Retrying in {:.2}s",
                        attempt + 1,
                        self.max_attempts,
                        error,
                        delay
                    );
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Delay before the next try. A server-supplied Retry-After hint takes
    /// precedence over the computed backoff.
    fn delay_for(&self, attempt: u32, error: &AppError) -> f64 {
        if let AppError::RateLimited {
            retry_after: Some(hint),
        } = error
        {
            return hint.max(0.0);
        }

        let base = self.backoff_factor.powi(attempt as i32);
        let max_jitter = self.jitter * base;
        let noise = if max_jitter > 0.0 {
            rand::thread_rng().gen_range(-max_jitter..=max_jitter)
        } else {
            0.0
        };
        (base + noise).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn transient() -> AppError {
        AppError::Api {
            status: 503,
            message: "unavailable".into(),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let policy = RetryPolicy::new(3, 0.01, 0.0).unwrap();
        let calls = Cell::new(0u32);

        let result: Result<i32> = policy
            .run(|| {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Err(transient())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_exhausts_attempts() {
        let policy = RetryPolicy::new(3, 0.01, 0.0).unwrap();
        let calls = Cell::new(0u32);

        let result: Result<i32> = policy
            .run(|| {
                calls.set(calls.get() + 1);
                async { Err(transient()) }
            })
            .await;

        assert!(matches!(result, Err(AppError::Api { status: 503, .. })));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_propagates_immediately() {
        let policy = RetryPolicy::new(5, 0.01, 0.0).unwrap();
        let calls = Cell::new(0u32);

        let result: Result<i32> = policy
            .run(|| {
                calls.set(calls.get() + 1);
                async { Err(AppError::invalid_date("20231301")) }
            })
            .await;

        assert!(matches!(result, Err(AppError::InvalidDate(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_hint_takes_precedence() {
        let policy = RetryPolicy::new(2, 100.0, 0.0).unwrap();
        let calls = Cell::new(0u32);

        // With backoff_factor 100 the computed delay would be one second;
        // the hint reduces it to 50ms.
        let start = tokio::time::Instant::now();
        let result: Result<i32> = policy
            .run(|| {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n == 1 {
                        Err(AppError::RateLimited {
                            retry_after: Some(0.05),
                        })
                    } else {
                        Ok(1)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(45));
        assert!(elapsed < Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_construction() {
        assert!(RetryPolicy::new(0, 2.0, 0.1).is_err());
        assert!(RetryPolicy::new(3, 0.0, 0.1).is_err());
        assert!(RetryPolicy::new(3, 2.0, 1.5).is_err());
    }
}
