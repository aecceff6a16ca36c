//! Error type definitions.
//!
//! This module defines the errors produced by collaborator operations, by the
//! rate limiter, by job processing and by application setup.

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),

    /// The configured base URL could not be parsed.
    #[error("Invalid API base URL: {0}")]
    BaseUrlError(#[from] url::ParseError),

    /// The rate limiter settings are not usable.
    #[error("Invalid rate limiter configuration: {0}")]
    ConfigError(#[from] crate::config::ConfigError),
}

/// Failure reported by an upstream operation.
///
/// Carries an HTTP-like status when one is known, plus a message. Both are
/// inspected when deciding whether the failure is throttling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", display_operation_error(.status, .message))]
pub struct OperationError {
    /// HTTP status reported by the upstream, if any
    pub status: Option<u16>,
    /// Human-readable failure description
    pub message: String,
}

fn display_operation_error(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("HTTP {}: {}", code, message),
        None => message.to_string(),
    }
}

impl OperationError {
    /// An error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        OperationError {
            status: None,
            message: message.into(),
        }
    }

    /// An error with a status code and message.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        OperationError {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Error returned to callers of the rate limiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The operation failed (after any retries).
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// The request was drained by `clear_queue` before it ran.
    #[error("Request cleared from queue")]
    Cleared,

    /// The limiter shut down before the request completed.
    #[error("Rate limiter shut down")]
    ShutDown,

    /// The batch was halted before this request was started.
    #[error("Batch halted before request started")]
    Halted,

    /// Internal invariant violation.
    #[error("Internal dispatch error: {0}")]
    Internal(String),
}

/// Job-level faults that fail a whole job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The job was cancelled before it finished.
    #[error("Job cancelled")]
    Cancelled,

    /// The processing task panicked.
    #[error("Job processing panicked: {0}")]
    Panicked(String),
}

/// Request outcomes counted by the rate limiter.
///
/// Every dispatched request ends in exactly one of `Success`, `RateLimited`,
/// `NonRetryable` or `Cleared`; `Retried` counts intermediate resubmissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum OutcomeType {
    /// Operation completed successfully
    Success,
    /// Final failure after exhausting retries on throttling errors
    RateLimited,
    /// Final failure that was never retried
    NonRetryable,
    /// A throttled attempt that was resubmitted
    Retried,
    /// Request drained from the queue without running
    Cleared,
}

impl std::fmt::Display for OutcomeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OutcomeType {
    /// Stable snake_case name used in logs and the status server.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeType::Success => "success",
            OutcomeType::RateLimited => "rate_limited",
            OutcomeType::NonRetryable => "non_retryable",
            OutcomeType::Retried => "retried",
            OutcomeType::Cleared => "cleared",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_error_display() {
        assert_eq!(
            OperationError::with_status(429, "Too Many Requests").to_string(),
            "HTTP 429: Too Many Requests"
        );
        assert_eq!(OperationError::new("no route").to_string(), "no route");
    }

    #[test]
    fn test_dispatch_error_wraps_operation_error() {
        let err: DispatchError = OperationError::with_status(404, "not found").into();
        assert_eq!(err.to_string(), "HTTP 404: not found");
        assert_eq!(DispatchError::Cleared.to_string(), "Request cleared from queue");
    }

    #[test]
    fn test_outcome_type_names() {
        assert_eq!(OutcomeType::RateLimited.to_string(), "rate_limited");
        assert_eq!(OutcomeType::NonRetryable.as_str(), "non_retryable");
    }
}
