//! Retry logic.
//!
//! # Responsibilities
//! - Repeat a fallible async operation until it succeeds
//! - Wait a fixed interval between attempts
//! - Abort the wait when the shutdown signal fires
//!
//! # Design Decisions
//! - No attempt cap: the config service is required for the process to work
//! - Fixed interval, no jitter: one client per process, no thundering herd
//! - Cancellation is an explicit error value carrying the attempt count

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// The retry loop was cancelled before the operation succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryCancelled {
    /// Failed attempts made before cancellation.
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    interval: Duration,
}

impl RetryPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run `op` until it returns `Ok`.
    ///
    /// Each failure is logged with `target` and followed by a wait of the policy
    /// interval. A triggered `shutdown` ends the loop before the next attempt.
    pub async fn run<T, E, F, Fut>(
        &self,
        target: &str,
        shutdown: &Shutdown,
        mut op: F,
    ) -> Result<T, RetryCancelled>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempts = 0u32;
        loop {
            if shutdown.is_triggered() {
                return Err(RetryCancelled { attempts });
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempts = attempts.saturating_add(1);
                    metrics::record_fetch_retry(target);
                    tracing::warn!(
                        target_path = target,
                        attempt = attempts,
                        retry_in_ms = self.interval.as_millis() as u64,
                        error = %e,
                        "Connection failed. Retrying."
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.wait() => return Err(RetryCancelled { attempts }),
            }
        }
    }
}
