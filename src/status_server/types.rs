//! Status server data structures.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::jobs::{BulkJob, BulkJobProcessor, JobStatus, Row};
use crate::rate_limiter::RateLimiterStatus;

/// Shared state for the status server
#[derive(Clone)]
pub struct StatusState {
    /// Processor whose jobs are served
    pub processor: BulkJobProcessor,
    /// Server start, for `/stats` uptime
    pub start_time: Arc<Instant>,
}

impl StatusState {
    /// State serving `processor`, with uptime counted from now.
    pub fn new(processor: BulkJobProcessor) -> Self {
        StatusState {
            processor,
            start_time: Arc::new(Instant::now()),
        }
    }
}

/// Body of `POST /jobs`
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub filename: String,
    pub rows: Vec<Row>,
}

/// Job listing entry for `GET /jobs` (per-row results omitted)
#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub id: String,
    pub filename: String,
    pub status: JobStatus,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub successful_searches: usize,
    pub failed_searches: usize,
    pub skipped_rows: usize,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&BulkJob> for JobSummary {
    fn from(job: &BulkJob) -> Self {
        JobSummary {
            id: job.id.clone(),
            filename: job.filename.clone(),
            status: job.status,
            total_rows: job.total_rows,
            processed_rows: job.processed_rows,
            successful_searches: job.successful_searches,
            failed_searches: job.failed_searches,
            skipped_rows: job.skipped_rows,
            progress: job.progress,
            estimated_time_remaining_seconds: job.estimated_time_remaining_seconds,
            error: job.error.clone(),
        }
    }
}

/// JSON response for the control endpoints
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// JSON response for `/stats`
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_seconds: f64,
    pub outcomes: HashMap<&'static str, usize>,
    pub total_failures: usize,
    pub rate_limiter: RateLimiterStatus,
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
