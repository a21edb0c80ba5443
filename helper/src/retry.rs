use backoff::backoff::Backoff;
use nutype::nutype;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::trace;

#[nutype(
    derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize),
    validate(greater = 0)
)]
pub struct MaxAttempts(usize);

#[nutype(
    derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize),
    validate(greater_or_equal = 0)
)]
pub struct RetryDelayMs(u64);

#[derive(Debug, thiserror::Error)]
#[error("Gave up after {attempts} attempt(s), last error: {last}")]
pub struct Exhausted<E: Display> {
    pub attempts: usize,
    pub last:     E,
}

/// Fixed-delay retry bounded by a number of attempts rather than by a
/// deadline.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: MaxAttempts,
    delay:        Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: MaxAttempts, delay: RetryDelayMs) -> Self {
        Self {
            max_attempts,
            delay: Duration::from_millis(delay.into_inner()),
        }
    }

    pub fn max_attempts(&self) -> usize { self.max_attempts.into_inner() }

    fn backoff(&self) -> FixedAttempts {
        let max_retries = self.max_attempts() - 1;
        FixedAttempts { max_retries, remaining: max_retries, delay: self.delay }
    }

    /// Run `operation` until it succeeds or the attempt budget is spent.
    /// Every error is considered transient.
    pub async fn retry<T, E, F, Fut>(
        &self,
        mut operation: F,
    ) -> Result<T, Exhausted<E>>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempts = 0;
        let res = backoff::future::retry_notify(
            self.backoff(),
            || {
                attempts += 1;
                let fut = operation();
                async move { fut.await.map_err(backoff::Error::transient) }
            },
            |err: E, wait: Duration| {
                trace!("Attempt failed ({}), retrying in {:?}", err, wait);
            },
        )
        .await;

        res.map_err(|last| Exhausted { attempts, last })
    }
}

#[derive(Debug, Clone)]
struct FixedAttempts {
    max_retries: usize,
    remaining:   usize,
    delay:       Duration,
}

impl Backoff for FixedAttempts {
    fn reset(&mut self) { self.remaining = self.max_retries; }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.delay)
    }
}
