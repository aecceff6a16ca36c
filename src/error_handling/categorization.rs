//! Error categorization.
//!
//! Decides whether an upstream failure is throttling, which is the only kind
//! of failure the rate limiter retries.

use crate::config::{HTTP_STATUS_TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE_PATTERNS};

use super::types::{DispatchError, OperationError};

/// Determines if an operation failure signals upstream rate limiting.
///
/// # Rate-limit signals
///
/// - Reported status 429 (Too Many Requests)
/// - Message containing, case-insensitively, "rate limit", "quota exceeded",
///   "too many requests" or "throttled"
///
/// Everything else (not-found, malformed request, server errors) is treated as
/// non-retryable and surfaces immediately as a row failure.
pub fn is_rate_limit_error(error: &OperationError) -> bool {
    if error.status == Some(HTTP_STATUS_TOO_MANY_REQUESTS) {
        return true;
    }
    let msg = error.message.to_lowercase();
    RATE_LIMIT_MESSAGE_PATTERNS
        .iter()
        .any(|pattern| msg.contains(pattern))
}

/// Same check for errors that already went through the limiter.
pub fn is_rate_limit_dispatch_error(error: &DispatchError) -> bool {
    match error {
        DispatchError::Operation(op) => is_rate_limit_error(op),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_429_is_rate_limit() {
        let err = OperationError::with_status(429, "");
        assert!(is_rate_limit_error(&err));
    }

    #[test]
    fn test_other_status_is_not_rate_limit() {
        assert!(!is_rate_limit_error(&OperationError::with_status(
            404,
            "not found"
        )));
        assert!(!is_rate_limit_error(&OperationError::with_status(
            500,
            "internal server error"
        )));
        assert!(!is_rate_limit_error(&OperationError::with_status(
            503,
            "service unavailable"
        )));
    }

    #[test]
    fn test_message_patterns_case_insensitive() {
        for msg in [
            "Rate limit reached for key",
            "QUOTA EXCEEDED",
            "upstream said: Too Many Requests",
            "request was Throttled",
        ] {
            assert!(
                is_rate_limit_error(&OperationError::new(msg)),
                "{} should be classified as rate limiting",
                msg
            );
        }
    }

    #[test]
    fn test_status_without_pattern_in_message() {
        // A non-429 status still counts when the message says so
        let err = OperationError::with_status(403, "daily quota exceeded");
        assert!(is_rate_limit_error(&err));
    }

    #[test]
    fn test_unrelated_messages() {
        assert!(!is_rate_limit_error(&OperationError::new("")));
        assert!(!is_rate_limit_error(&OperationError::new("connection reset")));
        assert!(!is_rate_limit_error(&OperationError::new("limit must be > 0")));
    }

    #[test]
    fn test_dispatch_error_classification() {
        let throttled = DispatchError::Operation(OperationError::with_status(429, "slow down"));
        assert!(is_rate_limit_dispatch_error(&throttled));
        assert!(!is_rate_limit_dispatch_error(&DispatchError::Cleared));
        assert!(!is_rate_limit_dispatch_error(&DispatchError::ShutDown));
    }
}
