//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (timing, limits, priorities)
//! - `RateLimiterConfig` / `ProcessorConfig` used by the library
//! - CLI option types and parsing

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{ConfigError, LogFormat, LogLevel, Opt, ProcessorConfig, RateLimiterConfig};
