//! Job query and control handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::super::types::{
    ControlResponse, ErrorResponse, JobSummary, StatusState, SubmitJobRequest,
};

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

fn job_not_found(job_id: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, format!("Job {} not found", job_id))
}

/// `GET /jobs`: every retained job, without per-row results
pub async fn list_jobs_handler(State(state): State<StatusState>) -> Response {
    let jobs: Vec<JobSummary> = state
        .processor
        .get_all_jobs()
        .iter()
        .map(JobSummary::from)
        .collect();
    Json(jobs).into_response()
}

/// `GET /jobs/:id`: full job including results
pub async fn get_job_handler(
    State(state): State<StatusState>,
    Path(job_id): Path<String>,
) -> Response {
    match state.processor.get_job_status(&job_id) {
        Some(job) => Json(job).into_response(),
        None => job_not_found(&job_id),
    }
}

/// `POST /jobs`: queue a new job
pub async fn submit_job_handler(
    State(state): State<StatusState>,
    Json(request): Json<SubmitJobRequest>,
) -> Response {
    let job = state.processor.submit(request.rows, request.filename);
    (StatusCode::ACCEPTED, Json(JobSummary::from(&job))).into_response()
}

/// Which control operation a request asked for.
#[derive(Clone, Copy)]
enum Control {
    Pause,
    Resume,
    Cancel,
}

impl Control {
    fn verb(self) -> &'static str {
        match self {
            Control::Pause => "paused",
            Control::Resume => "resumed",
            Control::Cancel => "cancelled",
        }
    }
}

fn control(state: &StatusState, job_id: &str, op: Control) -> Response {
    let Some(job) = state.processor.get_job_status(job_id) else {
        return job_not_found(job_id);
    };
    let applied = match op {
        Control::Pause => state.processor.pause_job(job_id),
        Control::Resume => state.processor.resume_job(job_id),
        Control::Cancel => state.processor.cancel_job(job_id),
    };
    if !applied {
        return error_response(
            StatusCode::CONFLICT,
            format!("Job {} cannot be {} while {}", job_id, op.verb(), job.status),
        );
    }
    let status = state
        .processor
        .get_job_status(job_id)
        .map_or(job.status, |job| job.status);
    Json(ControlResponse {
        job_id: job_id.to_string(),
        status,
    })
    .into_response()
}

/// `POST /jobs/:id/pause`
pub async fn pause_job_handler(
    State(state): State<StatusState>,
    Path(job_id): Path<String>,
) -> Response {
    control(&state, &job_id, Control::Pause)
}

/// `POST /jobs/:id/resume`
pub async fn resume_job_handler(
    State(state): State<StatusState>,
    Path(job_id): Path<String>,
) -> Response {
    control(&state, &job_id, Control::Resume)
}

/// `POST /jobs/:id/cancel`
pub async fn cancel_job_handler(
    State(state): State<StatusState>,
    Path(job_id): Path<String>,
) -> Response {
    control(&state, &job_id, Control::Cancel)
}
