use std::time::Duration;

use backoff::backoff::Backoff;

use crate::Error;

/// How failed requests are attempted again.
///
/// Only errors whose kind is retryable (see [`ErrorKind::is_retryable`])
/// are retried. The operation runs at most `retries + 1` times, waiting a
/// fixed interval between attempts.
///
/// [`ErrorKind::is_retryable`]: crate::ErrorKind::is_retryable
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            interval: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given number of retries and interval.
    #[inline]
    pub fn new(retries: u32, interval: Duration) -> Self {
        Self { retries, interval }
    }

    /// A policy that never retries.
    #[inline]
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// How many times a failed operation is attempted again.
    #[inline]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// The delay before each retry.
    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable
    /// error, or the retries are used up. The last error is returned in
    /// the latter two cases.
    pub async fn attempt<T, F, Fut>(&self, mut operation: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempts = 0u32;
        let result = backoff::future::retry_notify(
            FixedBackoff::new(self.retries, self.interval),
            || {
                attempts += 1;
                let fut = operation();
                async move {
                    fut.await.map_err(|err| {
                        if err.kind().is_retryable() {
                            backoff::Error::transient(err)
                        } else {
                            backoff::Error::permanent(err)
                        }
                    })
                }
            },
            |err: Error, delay: Duration| {
                warn!("attempt failed, retrying in {delay:?}: {err}");
            },
        )
        .await;
        if result.is_err() && attempts > 1 {
            debug!("giving up after {attempts} attempts");
        }
        result
    }
}

/// Yields the same interval a limited number of times.
struct FixedBackoff {
    interval: Duration,
    max_retries: u32,
    remaining: u32,
}

impl FixedBackoff {
    fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            interval,
            max_retries,
            remaining: max_retries,
        }
    }
}

impl Backoff for FixedBackoff {
    fn reset(&mut self) {
        self.remaining = self.max_retries;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.interval)
    }
}
