//! Fixed-delay retry for transient upstream failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};

/// Retry budget for calls that may fail transiently.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run `op` until it succeeds or the attempt budget is exhausted, sleeping
    /// the fixed delay between attempts. The last error is returned as-is.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_err: Option<Error> = None;
        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(%label, attempt, max_attempts = attempts, error = %err, "attempt failed");
                    last_err = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| Error::Internal(format!("{label} failed with no recorded error"))))
    }
}
