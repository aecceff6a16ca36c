//! Error handling and outcome statistics.
//!
//! This module provides:
//! - Error type definitions for operations, dispatch, jobs and setup
//! - Rate-limit classification of upstream failures
//! - Outcome counters for dispatched requests

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::{is_rate_limit_dispatch_error, is_rate_limit_error};
pub use stats::OutcomeStats;
pub use types::{DispatchError, InitializationError, JobError, OperationError, OutcomeType};
