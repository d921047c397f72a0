//! Retry wrapper for indexer reads.
//!
//! Reads against the height and transaction resources go through [`retry_transient`],
//! which re-runs the operation with jittered exponential backoff until it succeeds, the
//! error is not retryable, or the attempt budget is spent. The last error is returned.

use super::types::IndexerError;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry configuration for indexer reads.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after every failure.
    pub base_delay: Duration,
    /// Upper bound on any single delay, jitter included.
    pub max_delay: Duration,
    /// Randomization factor applied to each delay (0.0 disables jitter).
    pub jitter: f64,
    /// Decides whether an error is worth another attempt.
    pub retry_on: fn(&IndexerError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            jitter: 0.5,
            retry_on: IndexerError::is_transient,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry. Used for account and client mutations.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    fn backoff(&self) -> CappedBackoff {
        let inner = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_max_interval(self.max_delay)
            .with_randomization_factor(self.jitter)
            .with_multiplier(2.0)
            .with_max_elapsed_time(None)
            .build();
        CappedBackoff {
            inner,
            cap: self.max_delay,
        }
    }
}

/// `ExponentialBackoff` randomizes around the capped interval, which can overshoot the
/// cap by the jitter factor. This clamps every delay to the cap.
struct CappedBackoff {
    inner: ExponentialBackoff,
    cap: Duration,
}

impl Backoff for CappedBackoff {
    fn reset(&mut self) {
        self.inner.reset();
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.inner.next_backoff().map(|delay| delay.min(self.cap))
    }
}

/// Run `operation` under `policy`.
///
/// `operation` is called once per attempt and must build a fresh request each time.
/// Errors rejected by `policy.retry_on` are returned immediately.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    name: &str,
    mut operation: F,
) -> Result<T, IndexerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, IndexerError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let retry_on = policy.retry_on;
    let mut attempt = 0u32;

    backoff::future::retry_notify(
        policy.backoff(),
        || {
            attempt += 1;
            let current = attempt;
            let fut = operation();
            async move {
                match fut.await {
                    Ok(value) => Ok(value),
                    Err(e) if current < max_attempts && retry_on(&e) => {
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        },
        |e: IndexerError, delay: Duration| {
            warn!("{} failed, retrying in {:?}: {}", name, delay, e);
        },
    )
    .await
}
