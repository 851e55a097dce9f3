//! Retry policy for transient database failures
//!
//! Three layers:
//! - statement level: an `INSERT` that times out is re-sent immediately
//! - protocol level: a statement enqueued after a fatal connection error is
//!   re-sent on the recovered pool
//! - caller level: [`with_retry`] re-runs a whole operation on any transient
//!   error, backing off from the third retry on

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::{ModelError, ModelResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts for an INSERT that fails with `ETIMEDOUT`
    pub statement_attempts: u32,
    /// Re-sends after `PROTOCOL_ENQUEUE_AFTER_FATAL_ERROR`
    pub protocol_retries: u32,
    /// Attempts for [`with_retry`]
    pub max_attempts: u32,
    /// First retry number that waits before re-running
    pub backoff_start: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            statement_attempts: 3,
            protocol_retries: 3,
            max_attempts: 10,
            backoff_start: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            statement_attempts: 1,
            protocol_retries: 0,
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// Zero for early retries, then `base * retry` plus up to one `base` of
    /// jitter.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        if retry < self.backoff_start || self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let base_ms = self.base_delay.as_millis() as u64;
        let jitter = rand::thread_rng().gen_range(0..=base_ms);
        Duration::from_millis(base_ms * u64::from(retry) + jitter)
    }
}

/// Whether a failure may succeed if the operation is re-run.
///
/// Definition, configuration, hook and constraint errors never are.
pub fn is_transient(error: &ModelError) -> bool {
    error
        .db_error()
        .map(|err| err.kind.is_transient())
        .unwrap_or(false)
}

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// policy's attempts are spent. The last error carries the retry count.
pub async fn with_retry<F, Fut, R>(policy: &RetryPolicy, mut op: F) -> ModelResult<R>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ModelResult<R>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        debug!("Starting attempt {} of {}", attempts, max_attempts);

        match op().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let should_retry = attempts < max_attempts && is_transient(&e);
                if !should_retry {
                    return Err(annotate(e, attempts - 1));
                }

                let delay = policy.backoff_delay(attempts);
                warn!(
                    "Transient failure on attempt {}, retrying in {:?}: {}",
                    attempts, delay, e
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Attach the retry count to a database error; others pass through.
pub(crate) fn annotate(error: ModelError, retries: u32) -> ModelError {
    match error {
        ModelError::Database(err) if retries > 0 => {
            let total = err.retries.max(retries);
            ModelError::Database(err.with_retries(total))
        }
        other => other,
    }
}
