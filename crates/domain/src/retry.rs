//! Whole-unit-of-work retry on optimistic concurrency failures.

use std::{future::Future, time::Duration};

use backon::{ExponentialBuilder, Retryable};

use crate::error::DomainError;

/// Default number of attempts for a unit of work.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Exponential backoff with jitter between unit-of-work attempts.
///
/// `max_attempts` counts the first try, so it allows `max_attempts - 1`
/// retries.
pub(crate) fn unit_of_work_backoff(max_attempts: u32) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(5))
        .with_max_delay(Duration::from_millis(200))
        .with_max_times(max_attempts.max(1).saturating_sub(1) as usize)
        .with_jitter()
}

/// Runs `attempt` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is reached.
///
/// Each call to `attempt` must begin and commit its own unit of work so a
/// retry re-reads authoritative state.
pub(crate) async fn run_with_retry<T, F, Fut>(
    operation: &'static str,
    max_attempts: u32,
    attempt: F,
) -> Result<T, DomainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    attempt
        .retry(unit_of_work_backoff(max_attempts))
        .when(DomainError::is_retryable)
        .notify(|e: &DomainError, delay: Duration| {
            tracing::warn!(operation, ?delay, error = %e, "retrying unit of work");
        })
        .await
}
