//! Job and result records.

use serde::Serialize;

use crate::search::SearchMatch;

/// Lifecycle state of a bulk job.
///
/// `Queued -> Processing -> {Completed | Failed}`, with `Paused` reachable
/// from `Processing` and returning to `Queued` on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting in the job FIFO
    Queued,
    /// Being drained through the rate limiter
    Processing,
    /// Every row settled
    Completed,
    /// Cancelled or faulted
    Failed,
    /// Halted between sub-batches, waiting for resume
    Paused,
}

impl JobStatus {
    /// `Completed` and `Failed` never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Lowercase name used in logs and the status server.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Paused => "paused",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which lookup strategy a row used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMethod {
    /// Primary identifier, falling back to secondary then free text
    ExactIdentifier,
    /// Secondary identifier, falling back to free text
    SecondaryIdentifier,
    /// Free text built from description, brand and model
    FreeText,
}

/// Normalized identifiers a row was looked up with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchCriteria {
    /// Primary identifier (UPC/GTIN/EAN)
    pub upc: Option<String>,
    /// Secondary identifier (manufacturer part number)
    pub mpn: Option<String>,
    /// Free-text description
    pub description: Option<String>,
    /// Brand
    pub brand: Option<String>,
    /// Model
    pub model: Option<String>,
}

/// Outcome of one row's lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkResult {
    /// 1-based input row
    pub row: usize,
    /// Identifiers the lookup used
    pub search_criteria: SearchCriteria,
    /// Matches from the last attempted search
    pub found_matches: Vec<SearchMatch>,
    /// Strategy chosen for the row
    pub search_method: SearchMethod,
    /// Time from the first attempt to settlement, retries included
    pub processing_time_ms: u64,
    /// Times the operation ran
    pub attempts: u32,
    /// Final error, if the lookup failed
    pub error: Option<String>,
    /// Matches found and no error
    pub success: bool,
}

/// A submitted batch of rows and its progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkJob {
    /// Job identifier
    pub id: String,
    /// Label supplied at submission
    pub filename: String,
    /// Rows submitted
    pub total_rows: usize,
    /// Rows whose lookup settled
    pub processed_rows: usize,
    /// Settled rows whose lookup did not error
    pub successful_searches: usize,
    /// Settled rows whose lookup errored
    pub failed_searches: usize,
    /// Rows with nothing to search by
    pub skipped_rows: usize,
    /// Lifecycle state
    pub status: JobStatus,
    /// Submission time (Unix millis)
    pub created_at_ms: i64,
    /// First time processing started (Unix millis)
    pub start_time_ms: Option<i64>,
    /// Time the job reached a terminal state (Unix millis)
    pub end_time_ms: Option<i64>,
    /// Percentage of rows processed, 0..=100
    pub progress: f64,
    /// Remaining time at current throughput
    pub estimated_time_remaining_seconds: Option<f64>,
    /// Reason the job failed
    pub error: Option<String>,
    /// Per-row results ordered by row
    pub results: Vec<BulkResult>,
}

impl BulkJob {
    pub(crate) fn new(id: String, filename: String, total_rows: usize, created_at_ms: i64) -> Self {
        BulkJob {
            id,
            filename,
            total_rows,
            processed_rows: 0,
            successful_searches: 0,
            failed_searches: 0,
            skipped_rows: 0,
            status: JobStatus::Queued,
            created_at_ms,
            start_time_ms: None,
            end_time_ms: None,
            progress: 0.0,
            estimated_time_remaining_seconds: None,
            error: None,
            results: Vec::new(),
        }
    }

    /// Records a settled row, keeping `results` ordered by row.
    pub(crate) fn insert_result(&mut self, result: BulkResult) {
        let index = self.results.partition_point(|r| r.row < result.row);
        if self.results.get(index).map(|r| r.row) == Some(result.row) {
            self.results[index] = result;
        } else {
            self.results.insert(index, result);
        }
    }

    /// Whether row `row` (1-based) already has a result.
    pub(crate) fn has_result(&self, row: usize) -> bool {
        self.results.binary_search_by_key(&row, |r| r.row).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(row: usize) -> BulkResult {
        BulkResult {
            row,
            search_criteria: SearchCriteria::default(),
            found_matches: Vec::new(),
            search_method: SearchMethod::FreeText,
            processing_time_ms: 0,
            attempts: 1,
            error: None,
            success: false,
        }
    }

    #[test]
    fn test_results_kept_in_row_order() {
        let mut job = BulkJob::new("job-1".into(), "rows.csv".into(), 5, 0);
        for row in [3, 1, 5, 2] {
            job.insert_result(result(row));
        }
        let rows: Vec<usize> = job.results.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![1, 2, 3, 5]);
        assert!(job.has_result(5));
        assert!(!job.has_result(4));
    }

    #[test]
    fn test_insert_result_replaces_same_row() {
        let mut job = BulkJob::new("job-1".into(), "rows.csv".into(), 2, 0);
        job.insert_result(result(1));
        let mut again = result(1);
        again.attempts = 2;
        job.insert_result(again);
        assert_eq!(job.results.len(), 1);
        assert_eq!(job.results[0].attempts, 2);
    }

    #[test]
    fn test_serialized_enum_names() {
        assert_eq!(
            serde_json::to_value(SearchMethod::ExactIdentifier).unwrap(),
            "exact-identifier"
        );
        assert_eq!(
            serde_json::to_value(SearchMethod::SecondaryIdentifier).unwrap(),
            "secondary-identifier"
        );
        assert_eq!(serde_json::to_value(JobStatus::Paused).unwrap(), "paused");
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Paused.is_terminal());
    }
}
