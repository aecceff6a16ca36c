//! Progress logging utilities.

use log::info;

use crate::jobs::BulkJob;
use crate::rate_limiter::RateLimiterStatus;

/// Logs one progress line for `job` together with the limiter state.
pub fn log_progress(job: &BulkJob, limiter: &RateLimiterStatus) {
    let eta = job
        .estimated_time_remaining_seconds
        .map(|secs| format!(", ~{:.0}s left", secs))
        .unwrap_or_default();
    info!(
        "Job {} {}: {}/{} rows ({:.1}%){} | queue={} active={} tokens={}{}",
        job.id,
        job.status,
        job.processed_rows,
        job.total_rows,
        job.progress,
        eta,
        limiter.queue_length,
        limiter.active_requests,
        limiter.current_tokens,
        if limiter.circuit_breaker_open {
            " [circuit breaker open]"
        } else {
            ""
        }
    );
}
