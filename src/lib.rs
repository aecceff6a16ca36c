//! bulk_lookup library: rate-limited bulk dispatch against a catalog API
//!
//! This library runs large batches of catalog lookups against an upstream
//! search API that enforces a strict request quota. It is made of two layers:
//!
//! - [`RateLimiter`]: admission control for one upstream quota. A token
//!   bucket bounds throughput, a priority queue orders waiting requests,
//!   throttled failures are retried with exponential backoff and jitter, and a
//!   circuit breaker suspends all traffic after repeated failures.
//! - [`BulkJobProcessor`]: turns submitted rows into prioritized lookups,
//!   runs them through the limiter in paced sub-batches and tracks per-job
//!   progress, results and lifecycle (pause, resume, cancel).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bulk_lookup::{BulkJobProcessor, HttpCatalogSearch, RateLimiter, RateLimiterConfig, Row};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = RateLimiter::new(RateLimiterConfig {
//!     max_requests_per_second: 1.0,
//!     ..Default::default()
//! })?;
//! let search = HttpCatalogSearch::new(reqwest::Client::new(), "https://catalog.example.com/api/")?;
//! let processor = BulkJobProcessor::new(limiter, Arc::new(search), Default::default());
//!
//! let rows: Vec<Row> = vec![[("upc".to_string(), "012345678905".to_string())].into()];
//! let job = processor.submit(rows, "rows.json");
//! let finished = processor.wait_for_job(&job.id).await.expect("job retained");
//! println!("{}: {} succeeded, {} failed",
//!          finished.status, finished.successful_searches, finished.failed_searches);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Both components spawn background
//! tasks when constructed.

#![warn(missing_docs)]

mod app;
pub mod config;
mod error_handling;
pub mod events;
pub mod initialization;
mod jobs;
mod rate_limiter;
mod run;
mod search;
mod status_server;

// Re-export public API
pub use config::{ConfigError, LogFormat, LogLevel, Opt, ProcessorConfig, RateLimiterConfig};
pub use error_handling::{
    is_rate_limit_dispatch_error, is_rate_limit_error, DispatchError, InitializationError,
    JobError, OperationError, OutcomeStats, OutcomeType,
};
pub use events::{EventBus, JobEvent, LimiterEvent};
pub use jobs::{
    estimate_remaining_seconds, BulkJob, BulkJobProcessor, BulkResult, JobStatus, ProgressThrottle,
    Row, RowQuery, SearchCriteria, SearchMethod, TextQuery,
};
pub use rate_limiter::{BatchProgress, BatchRequest, RateLimiter, RateLimiterStatus};
pub use run::{load_rows, parse_rows, run_bulk_lookup, write_job, LookupReport};
pub use search::{CatalogSearch, HttpCatalogSearch, SearchMatch};
pub use status_server::{serve_status, start_status_server, StatusState};
