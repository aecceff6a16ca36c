//! Statistics printing.

use log::info;
use strum::IntoEnumIterator;

use crate::error_handling::{OutcomeStats, OutcomeType};
use crate::jobs::{BulkJob, JobStatus};

/// Prints non-zero request outcome counters.
pub fn print_outcome_statistics(stats: &OutcomeStats) {
    let dispatched: usize = OutcomeType::iter()
        .filter(|outcome| *outcome != OutcomeType::Retried)
        .map(|outcome| stats.get(outcome))
        .sum();
    if dispatched == 0 {
        return;
    }

    info!("Request outcomes ({} requests):", dispatched);
    for outcome in OutcomeType::iter() {
        let count = stats.get(outcome);
        if count > 0 {
            info!("   {}: {}", outcome.as_str(), count);
        }
    }
}

/// Prints a one-line summary of a finished (or abandoned) job.
pub fn print_job_summary(job: &BulkJob, elapsed_seconds: f64) {
    let searched = job.total_rows.saturating_sub(job.skipped_rows);
    match job.status {
        JobStatus::Completed => info!(
            "✅ Looked up {} row{} ({} succeeded, {} failed, {} skipped) in {:.1}s",
            searched,
            if searched == 1 { "" } else { "s" },
            job.successful_searches,
            job.failed_searches,
            job.skipped_rows,
            elapsed_seconds
        ),
        status => info!(
            "Job {} ended {} after {}/{} rows in {:.1}s{}",
            job.id,
            status,
            job.processed_rows,
            job.total_rows,
            elapsed_seconds,
            job.error
                .as_deref()
                .map(|e| format!(": {}", e))
                .unwrap_or_default()
        ),
    }
}
