//! Retry with exponential backoff for CRM calls.
//!
//! Only transient failures are retried (rate limiting, 5xx, timeouts and
//! connection errors). Everything else is returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::CrmError;

/// Backoff settings shared by product resolution and deal creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = no retries).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Growth factor between consecutive retries.
    pub multiplier: u32,
    /// Upper bound for any single delay, including `Retry-After`.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// Two retries, waiting 1s then 3s.
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            multiplier: 3,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            multiplier: 1,
            max_delay: Duration::ZERO,
        }
    }

    /// Retry up to `max_retries` times without waiting.
    #[must_use]
    pub const fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            multiplier: 1,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-indexed).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.saturating_pow(retry - 1);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay before retry `retry` after `error`, honouring `Retry-After`.
    #[must_use]
    pub fn delay_after(&self, retry: u32, error: &CrmError) -> Duration {
        let backoff = self.delay_for(retry);
        error
            .retry_after()
            .map_or(backoff, |secs| backoff.max(Duration::from_secs(secs)))
            .min(self.max_delay)
    }
}

/// Run `call` until it succeeds, fails permanently, or retries run out.
///
/// `operation` names the call in log output.
///
/// # Errors
///
/// Returns the last `CrmError` seen.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, CrmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CrmError>>,
{
    let mut retry = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && retry < policy.max_retries => {
                retry += 1;
                let delay = policy.delay_after(retry, &error);
                warn!(
                    operation,
                    retry,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "Transient CRM failure, retrying"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_default_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(3));
        assert_eq!(policy.delay_for(3), Duration::from_secs(9));
    }

    #[test]
    fn test_delay_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_after_honoured_up_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_after(1, &CrmError::RateLimited(5)),
            Duration::from_secs(5)
        );
        assert_eq!(
            policy.delay_after(1, &CrmError::RateLimited(120)),
            Duration::from_secs(30)
        );
    }

    #[tokio::test]
    async fn test_transient_errors_retried() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let result = with_retry(&RetryPolicy::immediate(2), "test", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(CrmError::Server { status: 503 })
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let result: Result<(), _> = with_retry(&RetryPolicy::immediate(2), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(CrmError::RateLimited(0))
        })
        .await;

        assert!(matches!(result, Err(CrmError::RateLimited(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let result: Result<(), _> = with_retry(&RetryPolicy::immediate(2), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(CrmError::Api {
                status: 400,
                message: "INVALID_DATA".to_string(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
