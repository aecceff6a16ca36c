//! Prometheus metrics handler.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::super::types::StatusState;
use crate::error_handling::OutcomeType;
use crate::jobs::JobStatus;

/// Prometheus-compatible metrics endpoint
pub async fn metrics_handler(State(state): State<StatusState>) -> Response {
    let jobs = state.processor.get_all_jobs();
    let count = |status: JobStatus| jobs.iter().filter(|job| job.status == status).count();
    let limiter = state.processor.rate_limiter();
    let limiter_status = limiter.status();
    let stats = limiter.stats();

    let metrics = format!(
        r#"# HELP bulk_lookup_jobs Retained jobs by status
# TYPE bulk_lookup_jobs gauge
bulk_lookup_jobs{{status="queued"}} {}
bulk_lookup_jobs{{status="processing"}} {}
bulk_lookup_jobs{{status="paused"}} {}
bulk_lookup_jobs{{status="completed"}} {}
bulk_lookup_jobs{{status="failed"}} {}

# HELP bulk_lookup_queue_length Requests waiting in the rate limiter queue
# TYPE bulk_lookup_queue_length gauge
bulk_lookup_queue_length {}

# HELP bulk_lookup_active_requests Requests currently running upstream
# TYPE bulk_lookup_active_requests gauge
bulk_lookup_active_requests {}

# HELP bulk_lookup_tokens Whole tokens available in the bucket
# TYPE bulk_lookup_tokens gauge
bulk_lookup_tokens {}

# HELP bulk_lookup_circuit_breaker_open Whether dispatching is suspended (0 or 1)
# TYPE bulk_lookup_circuit_breaker_open gauge
bulk_lookup_circuit_breaker_open {}

# HELP bulk_lookup_requests_total Request outcomes
# TYPE bulk_lookup_requests_total counter
bulk_lookup_requests_total{{outcome="success"}} {}
bulk_lookup_requests_total{{outcome="rate_limited"}} {}
bulk_lookup_requests_total{{outcome="non_retryable"}} {}
bulk_lookup_requests_total{{outcome="retried"}} {}
bulk_lookup_requests_total{{outcome="cleared"}} {}
"#,
        count(JobStatus::Queued),
        count(JobStatus::Processing),
        count(JobStatus::Paused),
        count(JobStatus::Completed),
        count(JobStatus::Failed),
        limiter_status.queue_length,
        limiter_status.active_requests,
        limiter_status.current_tokens,
        u8::from(limiter_status.circuit_breaker_open),
        stats.get(OutcomeType::Success),
        stats.get(OutcomeType::RateLimited),
        stats.get(OutcomeType::NonRetryable),
        stats.get(OutcomeType::Retried),
        stats.get(OutcomeType::Cleared),
    );

    (StatusCode::OK, metrics).into_response()
}
