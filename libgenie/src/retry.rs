//! Bounded retry with a fixed delay
//!
//! Every outbound publish call (post, reply, media upload) runs inside a
//! [`RetryPolicy`]. Failures are retried uniformly up to the attempt limit,
//! except throttling, which ends the loop at once so the caller can arm the
//! lockout guard.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::error::{GenieError, Result};

/// Attempt limit and fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_retries: u32,
    /// Constant pause between attempts (no exponential growth)
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(10),
        }
    }
}

/// What happened to a retried operation
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded(T),
    /// The platform signalled throttling; no further attempts were made
    Throttled(GenieError),
    /// Every attempt failed; carries the last error
    Exhausted(GenieError),
}

impl<T> RetryOutcome<T> {
    /// The value, or the "no result" signal
    pub fn ok(self) -> Option<T> {
        match self {
            RetryOutcome::Succeeded(value) => Some(value),
            RetryOutcome::Throttled(_) | RetryOutcome::Exhausted(_) => None,
        }
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, RetryOutcome::Throttled(_))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// A single attempt, no retries
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `op` until it succeeds, is throttled, or runs out of attempts
    ///
    /// `label` names the operation in log output. Never returns an error:
    /// the final failure is logged and reported through [`RetryOutcome`].
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_retries.max(1);

        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{} succeeded on attempt {}", label, attempt);
                    }
                    return RetryOutcome::Succeeded(value);
                }
                Err(e) if e.is_throttled() => {
                    warn!("{} throttled on attempt {}: {}", label, attempt, e);
                    return RetryOutcome::Throttled(e);
                }
                Err(e) if attempt < max_attempts => {
                    warn!(
                        "Error during {}: {}. Retrying in {}s... (attempt {}/{})",
                        label,
                        e,
                        self.retry_delay.as_secs_f32(),
                        attempt,
                        max_attempts
                    );
                    if !self.retry_delay.is_zero() {
                        sleep(self.retry_delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => {
                    error!("{} failed after {} attempt(s): {}", label, max_attempts, e);
                    return RetryOutcome::Exhausted(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::ZERO)
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retry_delay, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let calls = AtomicU32::new(0);
        let outcome = fast(3)
            .run("post", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, GenieError>("id-1".to_string())
            })
            .await;

        assert_eq!(outcome.ok().as_deref(), Some("id-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fails_twice_then_succeeds() {
        let calls = AtomicU32::new(0);
        let outcome = fast(3)
            .run("post", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(GenieError::from(PlatformError::Network("connection reset".into())))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(outcome.ok(), Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_always_failing_is_exhausted() {
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<()> = fast(3)
            .run("reply", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(GenieError::from(PlatformError::Posting(
                    "500 Internal Server Error".into(),
                )))
            })
            .await;

        assert!(matches!(outcome, RetryOutcome::Exhausted(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_throttling_stops_immediately() {
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<()> = fast(3)
            .run("post", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(GenieError::from(PlatformError::RateLimit(
                    "429 Too Many Requests".into(),
                )))
            })
            .await;

        assert!(outcome.is_throttled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_still_attempts_once() {
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<()> = fast(0)
            .run("upload", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(GenieError::from(PlatformError::Network("timeout".into())))
            })
            .await;

        assert!(outcome.ok().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_fixed_delay_between_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_secs(10));
        let started = tokio::time::Instant::now();

        let outcome: RetryOutcome<()> = policy
            .run("post", || async {
                Err::<(), _>(GenieError::from(PlatformError::Network("unreachable".into())))
            })
            .await;

        assert!(outcome.ok().is_none());
        // Two pauses between three attempts, each exactly the fixed delay
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(20) && elapsed < Duration::from_secs(21));
    }
}
