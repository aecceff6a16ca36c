//! HTTP status server for polling and controlling bulk jobs.
//!
//! Endpoints:
//! - `GET /jobs` - every retained job (summary)
//! - `POST /jobs` - submit `{"filename": .., "rows": [..]}`
//! - `GET /jobs/:id` - one job with its per-row results
//! - `POST /jobs/:id/pause`, `/resume`, `/cancel` - job control (409 when the
//!   transition is not valid, 404 for unknown jobs)
//! - `GET /rate-limiter` - queue, token and circuit breaker state
//! - `GET /stats` - request outcome counters
//! - `GET /metrics` - Prometheus-compatible metrics
//!
//! The server runs in the background and does not block job processing.

mod handlers;
mod types;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use handlers::{
    cancel_job_handler, get_job_handler, list_jobs_handler, metrics_handler, pause_job_handler,
    rate_limiter_handler, resume_job_handler, stats_handler, submit_job_handler,
};
pub use types::StatusState;

fn router(state: StatusState) -> Router {
    Router::new()
        .route("/jobs", get(list_jobs_handler).post(submit_job_handler))
        .route("/jobs/:id", get(get_job_handler))
        .route("/jobs/:id/pause", post(pause_job_handler))
        .route("/jobs/:id/resume", post(resume_job_handler))
        .route("/jobs/:id/cancel", post(cancel_job_handler))
        .route("/rate-limiter", get(rate_limiter_handler))
        .route("/stats", get(stats_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Creates and starts the status server on `127.0.0.1:port`
pub async fn start_status_server(port: u16, state: StatusState) -> Result<(), anyhow::Error> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind status server to port {}: {}", port, e))?;

    log::info!("Status server listening on http://127.0.0.1:{}/", port);
    log::info!("  - Jobs: http://127.0.0.1:{}/jobs", port);
    log::info!("  - Rate limiter: http://127.0.0.1:{}/rate-limiter", port);
    log::info!("  - Metrics: http://127.0.0.1:{}/metrics", port);

    serve_status(listener, state).await
}

/// Serves the status endpoints on an already bound listener
pub async fn serve_status(listener: TcpListener, state: StatusState) -> Result<(), anyhow::Error> {
    axum::serve(listener, router(state))
        .await
        .map_err(|e| anyhow::anyhow!("Status server error: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_status_server_port_binding_failure() {
        // Occupy a port, then ask the server for the same one
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let limiter = crate::RateLimiter::new(Default::default()).unwrap();
        let processor = crate::BulkJobProcessor::new(
            limiter,
            std::sync::Arc::new(crate::HttpCatalogSearch::new(
                reqwest::Client::new(),
                "http://127.0.0.1:9/",
            )
            .unwrap()),
            Default::default(),
        );

        let err = start_status_server(port, StatusState::new(processor))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Failed to bind status server"));
        assert!(msg.contains(&port.to_string()));
    }
}
