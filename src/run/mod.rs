//! One-shot bulk lookup run used by the binary.

mod io;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Result};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::app::{log_progress, print_job_summary, print_outcome_statistics, shutdown_gracefully};
use crate::config::{Opt, LOGGING_INTERVAL};
use crate::initialization::init_processor;
use crate::jobs::{BulkJobProcessor, JobStatus};
use crate::status_server::{start_status_server, StatusState};

pub use io::{load_rows, parse_rows, write_job};

/// Results of a bulk lookup run.
#[derive(Debug, Clone)]
pub struct LookupReport {
    /// Job identifier
    pub job_id: String,
    /// Final job status (`Completed` or `Failed`)
    pub status: JobStatus,
    /// Rows read from the input file
    pub total_rows: usize,
    /// Rows whose lookup did not error
    pub successful: usize,
    /// Rows whose lookup errored
    pub failed: usize,
    /// Rows with nothing to search by
    pub skipped: usize,
    /// Job failure reason, if any
    pub error: Option<String>,
    /// Where the job was written, if requested
    pub output: Option<PathBuf>,
    /// Elapsed time in seconds
    pub elapsed_seconds: f64,
}

/// Looks up every row of `opt.file` and waits for the job to finish.
///
/// Rows go through a single job on a fresh limiter. Progress is logged every
/// few seconds; Ctrl-C cancels the job. When `opt.status_port` is set the
/// status server runs alongside for the duration of the run.
///
/// # Errors
///
/// Returns an error if the input cannot be read, initialization fails, or the
/// output file cannot be written. A job that fails is not an error: check
/// `LookupReport::status`.
///
/// # Example
///
/// ```no_run
/// use bulk_lookup::{config::Opt, run_bulk_lookup};
/// use clap::Parser;
///
/// # async fn example() -> anyhow::Result<()> {
/// let opt = Opt::parse_from(["bulk_lookup", "rows.json", "--api-base-url", "http://localhost:8000/"]);
/// let report = run_bulk_lookup(opt).await?;
/// println!("{} succeeded, {} failed", report.successful, report.failed);
/// # Ok(())
/// # }
/// ```
pub async fn run_bulk_lookup(opt: Opt) -> Result<LookupReport> {
    let start_time = Instant::now();
    let rows = load_rows(&opt.file).await?;
    info!("Read {} rows from {}", rows.len(), opt.file.display());

    let processor = init_processor(&opt)?;

    if let Some(port) = opt.status_port {
        let state = StatusState::new(processor.clone());
        tokio::spawn(async move {
            if let Err(e) = start_status_server(port, state).await {
                warn!("{:#}", e);
            }
        });
    }

    let filename = opt
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| opt.file.display().to_string());
    let job_id = processor.submit(rows, filename).id;

    let cancel = CancellationToken::new();
    let logging_task = spawn_logging_task(&processor, &job_id, cancel.clone());

    let finished = tokio::select! {
        job = processor.wait_for_job(&job_id) => job,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling job {}", job_id);
            processor.cancel_job(&job_id);
            processor.get_job_status(&job_id)
        }
    };

    shutdown_gracefully(cancel, Some(logging_task), &processor).await;

    let job = finished.ok_or_else(|| anyhow!("Job {} disappeared before finishing", job_id))?;
    let elapsed_seconds = start_time.elapsed().as_secs_f64();

    log_progress(&job, &processor.get_rate_limiter_status());
    print_outcome_statistics(processor.rate_limiter().stats());
    print_job_summary(&job, elapsed_seconds);

    if let Some(path) = &opt.output {
        write_job(path, &job).await?;
        info!("Results written to {}", path.display());
    }

    Ok(LookupReport {
        job_id: job.id,
        status: job.status,
        total_rows: job.total_rows,
        successful: job.successful_searches,
        failed: job.failed_searches,
        skipped: job.skipped_rows,
        error: job.error,
        output: opt.output,
        elapsed_seconds,
    })
}

fn spawn_logging_task(
    processor: &BulkJobProcessor,
    job_id: &str,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let processor = processor.clone();
    let job_id = job_id.to_string();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(LOGGING_INTERVAL);
        // First tick fires immediately; nothing to report yet
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Some(job) = processor.get_job_status(&job_id) {
                        log_progress(&job, &processor.get_rate_limiter_status());
                    }
                }
            }
        }
    })
}
