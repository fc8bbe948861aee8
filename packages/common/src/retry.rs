use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::config::RetryPolicy;

/// Calculate the exponential backoff delay to wait after a failed attempt.
///
/// Formula: `base_ms * factor^(attempt-1)`. No jitter is added, so callers can
/// rely on the exact schedule.
pub fn calculate_backoff(attempt: u32, base_ms: u64, factor: f64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let delay_ms = base_ms as f64 * factor.powi(exponent);

    // Float-to-int casts saturate, so an overflowing schedule caps at u64::MAX.
    Duration::from_millis(delay_ms as u64)
}

/// Run `operation` until it succeeds, `should_retry` rejects the error, or
/// `policy.max_attempts` is reached.
///
/// Every failed attempt is logged. The error of the last attempt is returned
/// unchanged.
pub async fn with_retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !should_retry(&err) {
            warn!(attempt, error = %err, "Attempt failed with a non-retryable error");
            return Err(err);
        }

        if attempt >= max_attempts {
            error!(attempt, max_attempts, error = %err, "All retry attempts failed");
            return Err(err);
        }

        let delay = calculate_backoff(attempt, policy.initial_delay_ms, policy.backoff_factor);
        warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
