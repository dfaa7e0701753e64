// src/retry.rs

//! Retry orchestration on top of the key pool.
//!
//! [`call_with_rotation`] runs an upstream call with the pool's current key.
//! Rate-limit and overload failures rotate the pool and retry with the next
//! key, up to [`RetryPolicy::max_attempts`] calls in total. Any other failure
//! is returned at once.

use crate::classify::{CallOutcome, FailureKind, UpstreamFailure};
use crate::config::RetryConfig;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::pool::{KeyPool, RotationOutcome};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total upstream calls per request, including the first.
    pub max_attempts: u32,
    /// Pause before retrying the same key when rotation is impossible.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::ZERO,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Run `call` with keys from `pool`, rotating on rate-limit and overload.
///
/// `call` receives the key to use and is invoked at most
/// `policy.max_attempts` times (at least once when the pool holds a key).
///
/// # Errors
///
/// * [`AppError::NoKeysAvailable`] if the pool is empty; `call` never runs.
/// * [`AppError::UpstreamRejected`] on the first failure that rotation cannot
///   fix, carrying the upstream status and body.
/// * [`AppError::RetriesExhausted`] once every attempt failed with a rate
///   limit or overload.
pub async fn call_with_rotation<T, F, Fut>(
    pool: &KeyPool,
    policy: &RetryPolicy,
    mut call: F,
) -> Result<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = std::result::Result<T, UpstreamFailure>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_failure: Option<UpstreamFailure> = None;
    let mut attempts = 0;

    for attempt in 1..=max_attempts {
        let Some(key) = pool.acquire_key() else {
            if attempt == 1 {
                return Err(AppError::NoKeysAvailable);
            }
            warn!(attempt, "Key pool emptied while retrying");
            break;
        };
        attempts = attempt;
        let preview = pool.preview(&key);
        debug!(attempt, max_attempts, key.preview = %preview, "Calling upstream");

        let (failure, kind) = match CallOutcome::classify(call(key.clone()).await) {
            CallOutcome::Success(payload) => {
                pool.report_success(&key);
                if attempt > 1 {
                    info!(attempt, key.preview = %preview, "Upstream call succeeded after retry");
                }
                return Ok(payload);
            }
            CallOutcome::Other(failure) => {
                pool.report_upstream_failure(&key, FailureKind::Other);
                debug!(
                    attempt,
                    key.preview = %preview,
                    status = ?failure.status,
                    "Upstream failure is not retryable"
                );
                return Err(AppError::UpstreamRejected {
                    status: failure.status,
                    body: failure.message,
                });
            }
            CallOutcome::RateLimited(failure) => (failure, FailureKind::RateLimited),
            CallOutcome::Overloaded(failure) => (failure, FailureKind::Overloaded),
        };

        let outcome = pool.report_upstream_failure(&key, kind);
        warn!(
            attempt,
            max_attempts,
            %kind,
            key.preview = %preview,
            status = ?failure.status,
            ?outcome,
            "Upstream {kind}, retrying with key rotation"
        );
        last_failure = Some(failure);

        if outcome == RotationOutcome::Unavailable
            && attempt < max_attempts
            && !policy.backoff.is_zero()
        {
            debug!(backoff_ms = policy.backoff.as_millis() as u64, "No alternative key; backing off");
            sleep(policy.backoff).await;
        }
    }

    metrics::record_retries_exhausted();
    let (last_status, message) = match last_failure {
        Some(failure) => (failure.status, failure.message),
        None => (None, "no key available for retry".to_string()),
    };
    warn!(attempts, ?last_status, "Exhausted retries with key rotation");
    Err(AppError::RetriesExhausted {
        attempts,
        last_status,
        message,
    })
}
