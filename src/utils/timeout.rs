//! Timeouts and deadline polling
//!
//! Long-running generation jobs are started with one key and then polled
//! until they finish. These helpers sit on top of the key pool: the pool
//! itself never times anything out.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Polling configuration for long-running jobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between status checks
    pub interval: Duration,

    /// Give up once this much time has passed since the first check
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Poll `check` until it yields a value, fails, or the timeout elapses
///
/// `check` returns `Ok(Some(value))` when the job is done and `Ok(None)`
/// while it is still pending. The first check always runs; the deadline is
/// tested after every pending check, before sleeping.
pub async fn poll_until<T, E, F, Fut>(
    config: &PollConfig,
    mut check: F,
) -> Result<T, TimeoutError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let mut checks: u32 = 0;

    loop {
        checks += 1;
        match check().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(err) => return Err(TimeoutError::Inner(err)),
        }

        if started.elapsed() >= config.timeout {
            tracing::warn!(
                checks,
                timeout_secs = config.timeout.as_secs_f64(),
                "Polling timed out"
            );
            return Err(TimeoutError::Timeout(config.timeout));
        }

        tracing::trace!(checks, interval_ms = config.interval.as_millis() as u64, "Still pending");
        tokio::time::sleep(config.interval).await;
    }
}

/// Apply timeout to an async operation
pub async fn with_timeout<T, E>(
    timeout: Duration,
    future: impl Future<Output = Result<T, E>>,
) -> Result<T, TimeoutError<E>> {
    match tokio::time::timeout(timeout, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(TimeoutError::Inner(err)),
        Err(_) => Err(TimeoutError::Timeout(timeout)),
    }
}

/// Error type for timeout operations
#[derive(Debug, thiserror::Error)]
pub enum TimeoutError<E> {
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Inner(E),
}

impl<E> TimeoutError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimeoutError::Timeout(_))
    }

    /// Get the inner error if not a timeout
    pub fn into_inner(self) -> Option<E> {
        match self {
            TimeoutError::Inner(e) => Some(e),
            TimeoutError::Timeout(_) => None,
        }
    }
}
