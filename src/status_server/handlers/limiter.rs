//! Rate limiter status and outcome statistics handlers.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};

use super::super::types::{StatsResponse, StatusState};

/// `GET /rate-limiter`: queue, token and breaker state
pub async fn rate_limiter_handler(State(state): State<StatusState>) -> Response {
    Json(state.processor.get_rate_limiter_status()).into_response()
}

/// `GET /stats`: request outcome counters
pub async fn stats_handler(State(state): State<StatusState>) -> Response {
    let limiter = state.processor.rate_limiter();
    let stats = limiter.stats();
    Json(StatsResponse {
        uptime_seconds: state.start_time.elapsed().as_secs_f64(),
        outcomes: stats.snapshot(),
        total_failures: stats.total_failures(),
        rate_limiter: limiter.status(),
    })
    .into_response()
}
