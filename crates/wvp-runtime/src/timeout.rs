//! Caller-side time bounds.
//!
//! The core never bounds remote round trips itself. Callers that want a bound
//! wrap the future here; dropping it on elapse is safe because every in-flight
//! resource (transaction slot, refresh marker) is released by a guard.

use std::fmt;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut {
    pub op: &'static str,
    pub after: Duration,
}

impl fmt::Display for TimedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} timed out after {}ms", self.op, self.after.as_millis())
    }
}

impl std::error::Error for TimedOut {}

/// Run `fut`, giving up after `limit` if one is set.
pub async fn with_timeout<F, T>(
    op: &'static str,
    limit: Option<Duration>,
    fut: F,
) -> Result<T, TimedOut>
where
    F: Future<Output = T>,
{
    match limit {
        None => Ok(fut.await),
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| TimedOut { op, after }),
    }
}
