//! Configuration types and CLI options.
//!
//! This module defines the structs used to configure the rate limiter and the
//! job processor, plus the command-line surface of the binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::config::constants::*;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Invalid limiter or processor settings.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    /// Throughput must be a positive, finite number.
    #[error("max_requests_per_second must be positive, got {0}")]
    InvalidRate(f64),

    /// A count that must be at least one was zero.
    #[error("{0} must be at least 1")]
    ZeroValue(&'static str),
}

/// Admission-control settings for a single upstream quota.
///
/// Immutable once the limiter is constructed.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Steady-state refill rate of the token bucket
    pub max_requests_per_second: f64,
    /// Token bucket capacity
    pub max_burst_requests: u32,
    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
    /// Retries allowed for rate-limited failures
    pub max_retries: u32,
    /// Consecutive final failures before the breaker opens
    pub circuit_breaker_threshold: u32,
    /// Requests awaited concurrently per sub-batch
    pub batch_size: usize,
    /// Number of priority levels in use (informational)
    pub priority_levels: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests_per_second: DEFAULT_MAX_REQUESTS_PER_SECOND,
            max_burst_requests: DEFAULT_MAX_BURST_REQUESTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            circuit_breaker_threshold: DEFAULT_CIRCUIT_BREAKER_THRESHOLD,
            batch_size: DEFAULT_BATCH_SIZE,
            priority_levels: DEFAULT_PRIORITY_LEVELS,
        }
    }
}

impl RateLimiterConfig {
    /// Checks that the settings describe a usable limiter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.max_requests_per_second.is_finite() || self.max_requests_per_second <= 0.0 {
            return Err(ConfigError::InvalidRate(self.max_requests_per_second));
        }
        if self.max_burst_requests == 0 {
            return Err(ConfigError::ZeroValue("max_burst_requests"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroValue("batch_size"));
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(ConfigError::ZeroValue("circuit_breaker_threshold"));
        }
        Ok(())
    }

    /// How long the breaker stays open once tripped.
    pub fn circuit_breaker_cooldown(&self) -> Duration {
        Duration::from_millis(
            self.retry_delay_ms
                .saturating_mul(CIRCUIT_BREAKER_COOLDOWN_MULTIPLIER),
        )
    }
}

/// Job processor settings.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Minimum spacing between job-progress events
    pub progress_interval: Duration,
    /// Finished jobs kept for status queries
    pub retention_count: usize,
    /// Period of the background retention sweep
    pub cleanup_interval: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            progress_interval: PROGRESS_EVENT_INTERVAL,
            retention_count: JOB_RETENTION_COUNT,
            cleanup_interval: JOB_CLEANUP_INTERVAL,
        }
    }
}

/// Command-line options and configuration.
///
/// This struct is automatically generated by `clap` from the field attributes.
/// Every option also reads from a `BULK_LOOKUP_*` environment variable, so a
/// `.env` file can carry deployment settings.
///
/// # Examples
///
/// ```bash
/// # Basic usage
/// bulk_lookup rows.json --api-base-url https://catalog.example.com/api/
///
/// # Slower upstream, larger sub-batches, status server on port 8080
/// bulk_lookup rows.json --rate-limit-rps 0.5 --batch-size 20 --status-port 8080
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "bulk_lookup",
    about = "Runs catalog lookups for a batch of rows under a strict upstream rate limit."
)]
pub struct Opt {
    /// JSON file containing an array of rows (objects of string values)
    #[arg(value_parser)]
    pub file: PathBuf,

    /// Base URL of the catalog search API
    #[arg(long, env = "BULK_LOOKUP_API_URL")]
    pub api_base_url: String,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Steady-state requests per second against the upstream API
    #[arg(long, env = "BULK_LOOKUP_RPS", default_value_t = DEFAULT_MAX_REQUESTS_PER_SECOND)]
    pub rate_limit_rps: f64,

    /// Token bucket capacity (burst)
    #[arg(long, env = "BULK_LOOKUP_BURST", default_value_t = DEFAULT_MAX_BURST_REQUESTS)]
    pub rate_burst: u32,

    /// Retries for rate-limited requests
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY_MS)]
    pub retry_delay_ms: u64,

    /// Consecutive failures before all traffic is suspended
    #[arg(long, default_value_t = DEFAULT_CIRCUIT_BREAKER_THRESHOLD)]
    pub circuit_breaker_threshold: u32,

    /// Requests awaited concurrently per sub-batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// HTTP status server port (optional, disabled by default)
    #[arg(long, env = "BULK_LOOKUP_STATUS_PORT")]
    pub status_port: Option<u16>,

    /// Write the finished job (JSON) to this path
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl From<&Opt> for RateLimiterConfig {
    fn from(opt: &Opt) -> Self {
        Self {
            max_requests_per_second: opt.rate_limit_rps,
            max_burst_requests: opt.rate_burst,
            retry_delay_ms: opt.retry_delay_ms,
            max_retries: opt.max_retries,
            circuit_breaker_threshold: opt.circuit_breaker_threshold,
            batch_size: opt.batch_size,
            ..Default::default()
        }
    }
}
