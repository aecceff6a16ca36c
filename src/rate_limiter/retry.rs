//! Retry decisions and backoff.

use std::time::Duration;

use rand::Rng;

use crate::config::{RateLimiterConfig, RETRY_JITTER_FRACTION};
use crate::error_handling::{is_rate_limit_error, OperationError};

/// What the dispatcher does with a finished attempt.
#[derive(Debug)]
pub(crate) enum RetryDecision<T> {
    /// Deliver the value to the caller.
    Success(T),
    /// Resubmit the request after `delay`.
    Retry(Duration),
    /// Deliver the error to the caller. `rate_limited` tells the statistics
    /// whether retries were exhausted or the error was never retryable.
    Fail {
        error: OperationError,
        rate_limited: bool,
    },
}

impl<T> RetryDecision<T> {
    /// Decides the fate of an attempt.
    ///
    /// Only rate-limit failures are retried, and only while `retry_count`
    /// (retries already made) is below `max_retries`.
    pub fn from_outcome(
        outcome: Result<T, OperationError>,
        retry_count: u32,
        config: &RateLimiterConfig,
    ) -> Self {
        match outcome {
            Ok(value) => RetryDecision::Success(value),
            Err(error) => {
                let rate_limited = is_rate_limit_error(&error);
                if rate_limited && retry_count < config.max_retries {
                    RetryDecision::Retry(backoff_delay(config.retry_delay_ms, retry_count + 1))
                } else {
                    RetryDecision::Fail {
                        error,
                        rate_limited,
                    }
                }
            }
        }
    }
}

/// Exponential delay for the given retry number, without jitter.
///
/// `retry_delay_ms x 2^(retry - 1)` for retries starting at 1.
pub(crate) fn base_backoff(retry_delay_ms: u64, retry: u32) -> Duration {
    let exponent = retry.saturating_sub(1).min(32);
    Duration::from_millis(retry_delay_ms.saturating_mul(1u64 << exponent))
}

/// Exponential delay plus up to 30% random jitter.
pub(crate) fn backoff_delay(retry_delay_ms: u64, retry: u32) -> Duration {
    let base = base_backoff(retry_delay_ms, retry);
    let max_jitter = base.as_secs_f64() * RETRY_JITTER_FRACTION;
    let jitter = if max_jitter > 0.0 {
        rand::rng().random_range(0.0..=max_jitter)
    } else {
        0.0
    };
    base.saturating_add(Duration::from_secs_f64(jitter))
}
