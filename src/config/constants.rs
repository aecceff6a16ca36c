//! Configuration constants.
//!
//! This module defines the timing and sizing constants used by the rate limiter
//! and the job processor. Most of them are defaults that can be overridden via
//! `RateLimiterConfig` or `ProcessorConfig`.

use std::time::Duration;

// Rate limiter defaults
/// Default steady-state throughput against the upstream API
pub const DEFAULT_MAX_REQUESTS_PER_SECOND: f64 = 2.0;
/// Default token bucket capacity
pub const DEFAULT_MAX_BURST_REQUESTS: u32 = 5;
/// Default base delay for exponential backoff (milliseconds)
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
/// Default number of retries for rate-limited requests
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default number of consecutive final failures before the breaker opens
pub const DEFAULT_CIRCUIT_BREAKER_THRESHOLD: u32 = 5;
/// Default number of requests per sub-batch
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Default number of priority levels (informational)
pub const DEFAULT_PRIORITY_LEVELS: u32 = 3;

// Dispatch timing
/// Token refill tick interval
pub const TOKEN_REFILL_INTERVAL: Duration = Duration::from_millis(100);
/// Fixed pause after each dispatched request
pub const INTER_REQUEST_DELAY: Duration = Duration::from_millis(50);
/// Poll interval while the bucket is empty
pub const TOKEN_WAIT_INTERVAL: Duration = Duration::from_millis(100);
/// Upper bound on a single sleep while the circuit breaker is open
pub const BREAKER_POLL_MAX: Duration = Duration::from_secs(1);
/// Per-index start offset inside a sub-batch
pub const BATCH_STAGGER_DELAY: Duration = Duration::from_millis(100);
/// Pause between consecutive sub-batches
pub const INTER_BATCH_DELAY: Duration = Duration::from_millis(500);
/// Breaker cooldown = `retry_delay_ms` x this multiplier
pub const CIRCUIT_BREAKER_COOLDOWN_MULTIPLIER: u64 = 10;
/// Jitter added to each backoff delay, as a fraction of the delay (30%)
pub const RETRY_JITTER_FRACTION: f64 = 0.3;

// HTTP status codes
/// HTTP 429 Too Many Requests
pub const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Message fragments (lowercase) that mark an upstream failure as throttling
pub const RATE_LIMIT_MESSAGE_PATTERNS: [&str; 4] = [
    "rate limit",
    "quota exceeded",
    "too many requests",
    "throttled",
];

// Job processor
/// Minimum spacing between job-progress events
pub const PROGRESS_EVENT_INTERVAL: Duration = Duration::from_secs(2);
/// Number of finished jobs kept for status queries
pub const JOB_RETENTION_COUNT: usize = 10;
/// How often finished jobs are pruned
pub const JOB_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

// Priorities assigned by search mode
/// Priority for rows with a primary identifier
pub const PRIORITY_PRIMARY_IDENTIFIER: i32 = 3;
/// Priority for rows with only a secondary identifier
pub const PRIORITY_SECONDARY_IDENTIFIER: i32 = 2;
/// Priority for free-text rows
pub const PRIORITY_FREE_TEXT: i32 = 1;

/// Capacity of the event broadcast channels
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Interval between progress log lines in the CLI
pub const LOGGING_INTERVAL: Duration = Duration::from_secs(5);
/// Per-request timeout for the HTTP search adapter
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
