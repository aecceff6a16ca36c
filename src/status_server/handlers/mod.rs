//! Status server HTTP handlers.

mod jobs;
mod limiter;
mod metrics;

pub use jobs::{
    cancel_job_handler, get_job_handler, list_jobs_handler, pause_job_handler,
    resume_job_handler, submit_job_handler,
};
pub use limiter::{rate_limiter_handler, stats_handler};
pub use metrics::metrics_handler;
