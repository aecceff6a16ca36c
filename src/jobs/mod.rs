//! Bulk job processing.
//!
//! A job is a batch of rows submitted together. Jobs wait in a FIFO and are
//! drained one at a time; the rows of the active job fan out through the
//! shared `RateLimiter`, which bounds throughput and retries throttled
//! lookups.
//!
//! Job state lives in a table behind one lock. The drain loop owns the job it
//! is processing; pause, resume and cancel only flip the status (and the
//! job's cancellation token), which the drain loop observes before starting
//! each sub-batch.

mod criteria;
mod lookup;
mod progress;
mod types;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::ProcessorConfig;
use crate::error_handling::{DispatchError, JobError};
use crate::events::{EventBus, JobEvent};
use crate::rate_limiter::{BatchProgress, BatchRequest, RateLimiter, RateLimiterStatus};
use crate::search::{CatalogSearch, SearchMatch};

pub use criteria::{RowQuery, TextQuery};
use lookup::{lookup_row, RowProbe};
pub use progress::{estimate_remaining_seconds, ProgressThrottle};
pub use types::{BulkJob, BulkResult, JobStatus, SearchCriteria, SearchMethod};

/// One input row: column name to cell value.
pub type Row = HashMap<String, String>;

struct JobEntry {
    /// Submission order
    seq: u64,
    job: BulkJob,
    rows: Arc<Vec<Row>>,
    cancel: CancellationToken,
}

struct ProcessorState {
    jobs: HashMap<String, JobEntry>,
    fifo: VecDeque<String>,
    draining: bool,
}

struct ProcessorInner {
    limiter: RateLimiter,
    search: Arc<dyn CatalogSearch>,
    config: ProcessorConfig,
    state: Mutex<ProcessorState>,
    events: EventBus<JobEvent>,
    shutdown: CancellationToken,
    next_seq: AtomicU64,
}

/// Counters a run starts from; non-zero when a paused job resumes.
#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    processed: usize,
    successful: usize,
    failed: usize,
}

/// What a single drain of a job needs.
struct JobRun {
    rows: Arc<Vec<Row>>,
    cancel: CancellationToken,
    base: Counters,
    /// 1-based rows that already have a result
    done: Vec<usize>,
}

/// A row submitted to the limiter in this run.
struct PendingRow {
    row: usize,
    criteria: SearchCriteria,
    method: SearchMethod,
    probe: RowProbe,
}

/// Runs submitted jobs through a rate limiter and tracks their progress.
///
/// Cloning yields another handle to the same job table.
///
/// # Runtime
///
/// `new` spawns the retention task, so it must be called from within a Tokio
/// runtime.
#[derive(Clone)]
pub struct BulkJobProcessor {
    inner: Arc<ProcessorInner>,
}

impl BulkJobProcessor {
    /// Creates a processor that looks rows up through `search`, admitted by
    /// `limiter`.
    pub fn new(limiter: RateLimiter, search: Arc<dyn CatalogSearch>, config: ProcessorConfig) -> Self {
        let inner = Arc::new(ProcessorInner {
            limiter,
            search,
            config,
            state: Mutex::new(ProcessorState {
                jobs: HashMap::new(),
                fifo: VecDeque::new(),
                draining: false,
            }),
            events: EventBus::new(),
            shutdown: CancellationToken::new(),
            next_seq: AtomicU64::new(1),
        });
        spawn_cleanup_task(&inner);
        BulkJobProcessor { inner }
    }

    /// Queues a job and returns it immediately.
    ///
    /// Rows that offer nothing to search by are skipped: they count towards
    /// `skipped_rows` and never get a result.
    pub fn submit(&self, rows: Vec<Row>, filename: impl Into<String>) -> BulkJob {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::SeqCst);
        let now_ms = chrono::Utc::now().timestamp_millis();
        let id = format!("job_{}_{}", now_ms, seq);
        let job = BulkJob::new(id.clone(), filename.into(), rows.len(), now_ms);

        let start = {
            let mut state = self.inner.state.lock();
            state.jobs.insert(
                id.clone(),
                JobEntry {
                    seq,
                    job: job.clone(),
                    rows: Arc::new(rows),
                    cancel: CancellationToken::new(),
                },
            );
            state.fifo.push_back(id.clone());
            let start = !state.draining;
            state.draining = true;
            start
        };

        log::info!(
            "Job {} queued ({} rows from {})",
            id,
            job.total_rows,
            job.filename
        );
        if start {
            spawn_drain_loop(&self.inner);
        }
        job
    }

    /// Snapshot of one job.
    pub fn get_job_status(&self, job_id: &str) -> Option<BulkJob> {
        self.inner
            .state
            .lock()
            .jobs
            .get(job_id)
            .map(|entry| entry.job.clone())
    }

    /// Snapshots of every retained job, in submission order.
    pub fn get_all_jobs(&self) -> Vec<BulkJob> {
        let state = self.inner.state.lock();
        let mut entries: Vec<&JobEntry> = state.jobs.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| entry.job.clone()).collect()
    }

    /// Status of the shared rate limiter.
    pub fn get_rate_limiter_status(&self) -> RateLimiterStatus {
        self.inner.limiter.status()
    }

    /// The rate limiter jobs are dispatched through.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    /// Halts a processing job before its next sub-batch.
    ///
    /// In-flight lookups still complete and are recorded. Returns `false`
    /// unless the job is `Processing`.
    pub fn pause_job(&self, job_id: &str) -> bool {
        {
            let mut state = self.inner.state.lock();
            match state.jobs.get_mut(job_id) {
                Some(entry) if entry.job.status == JobStatus::Processing => {
                    entry.job.status = JobStatus::Paused;
                }
                _ => return false,
            }
        }
        log::info!("Job {} paused", job_id);
        self.inner.events.emit(JobEvent::JobPaused {
            job_id: job_id.to_string(),
        });
        true
    }

    /// Puts a paused job back in the FIFO.
    ///
    /// Only rows without a result are looked up again. Returns `false`
    /// unless the job is `Paused`.
    pub fn resume_job(&self, job_id: &str) -> bool {
        let start = {
            let mut state = self.inner.state.lock();
            match state.jobs.get_mut(job_id) {
                Some(entry) if entry.job.status == JobStatus::Paused => {
                    entry.job.status = JobStatus::Queued;
                }
                _ => return false,
            }
            state.fifo.push_back(job_id.to_string());
            let start = !state.draining;
            state.draining = true;
            start
        };
        log::info!("Job {} resumed", job_id);
        self.inner.events.emit(JobEvent::JobResumed {
            job_id: job_id.to_string(),
        });
        if start {
            spawn_drain_loop(&self.inner);
        }
        true
    }

    /// Fails a job that has not finished yet.
    ///
    /// In-flight lookups are abandoned, not awaited. Returns `false` if the
    /// job is unknown or already terminal.
    pub fn cancel_job(&self, job_id: &str) -> bool {
        {
            let mut state = self.inner.state.lock();
            let Some(entry) = state.jobs.get_mut(job_id) else {
                return false;
            };
            if entry.job.status.is_terminal() {
                return false;
            }
            entry.job.status = JobStatus::Failed;
            entry.job.end_time_ms = Some(chrono::Utc::now().timestamp_millis());
            entry.job.estimated_time_remaining_seconds = None;
            entry.job.error = Some(JobError::Cancelled.to_string());
            entry.cancel.cancel();
        }
        log::warn!("Job {} cancelled", job_id);
        self.inner.events.emit(JobEvent::JobCancelled {
            job_id: job_id.to_string(),
        });
        true
    }

    /// Waits until the job is completed or failed.
    ///
    /// Returns `None` if the job is unknown (or was evicted). A paused job
    /// that is never resumed keeps this waiting.
    pub async fn wait_for_job(&self, job_id: &str) -> Option<BulkJob> {
        let mut events = self.subscribe();
        loop {
            let job = self.get_job_status(job_id)?;
            if job.status.is_terminal() {
                return Some(job);
            }
            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return self.get_job_status(job_id),
            }
        }
    }

    /// Evicts finished jobs beyond the retention count, oldest start first.
    ///
    /// Runs after every job and periodically; returns the number removed.
    pub fn cleanup_finished_jobs(&self) -> usize {
        self.inner.cleanup_finished_jobs()
    }

    /// Subscribes to job events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Stops the retention task and stops draining after the current job.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        log::debug!("Job processor shut down");
    }
}

impl ProcessorInner {
    /// Next job id from the FIFO; clears the draining flag when there is none.
    fn next_queued_job(&self) -> Option<String> {
        let mut state = self.state.lock();
        let next = if self.shutdown.is_cancelled() {
            None
        } else {
            state.fifo.pop_front()
        };
        if next.is_none() {
            state.draining = false;
        }
        next
    }

    fn job_status(&self, job_id: &str) -> Option<JobStatus> {
        self.state.lock().jobs.get(job_id).map(|entry| entry.job.status)
    }

    /// Moves a queued job to `Processing`. `None` if it was cancelled or
    /// evicted while waiting.
    fn begin_job(&self, job_id: &str) -> Option<JobRun> {
        let (run, total_rows) = {
            let mut state = self.state.lock();
            let entry = state.jobs.get_mut(job_id)?;
            if entry.job.status != JobStatus::Queued {
                log::debug!("Skipping job {} ({})", job_id, entry.job.status);
                return None;
            }
            let job = &mut entry.job;
            job.status = JobStatus::Processing;
            job.start_time_ms
                .get_or_insert_with(|| chrono::Utc::now().timestamp_millis());
            let run = JobRun {
                rows: Arc::clone(&entry.rows),
                cancel: entry.cancel.clone(),
                base: Counters {
                    processed: job.processed_rows,
                    successful: job.successful_searches,
                    failed: job.failed_searches,
                },
                done: job.results.iter().map(|r| r.row).collect(),
            };
            (run, job.total_rows)
        };

        log::info!("Job {} started ({} rows)", job_id, total_rows);
        self.events.emit(JobEvent::JobStarted {
            job_id: job_id.to_string(),
            total_rows,
        });
        Some(run)
    }

    fn set_skipped_rows(&self, job_id: &str, skipped: usize) {
        if let Some(entry) = self.state.lock().jobs.get_mut(job_id) {
            entry.job.skipped_rows = skipped;
        }
    }

    fn record_progress(
        &self,
        job_id: &str,
        base: Counters,
        batch: BatchProgress,
        elapsed: Duration,
        throttle: &mut ProgressThrottle,
    ) {
        let event = {
            let mut state = self.state.lock();
            let Some(entry) = state.jobs.get_mut(job_id) else {
                return;
            };
            let job = &mut entry.job;
            if job.status.is_terminal() {
                return;
            }
            job.processed_rows = base.processed + batch.processed;
            job.failed_searches = base.failed + batch.failed;
            job.successful_searches = base.successful + (batch.processed - batch.failed);
            job.progress = progress::percent(job.processed_rows, job.total_rows);
            job.estimated_time_remaining_seconds =
                estimate_remaining_seconds(batch.total - batch.processed, batch.processed, elapsed);

            if !throttle.ready(Instant::now()) {
                return;
            }
            JobEvent::JobProgress {
                job_id: job_id.to_string(),
                processed_rows: job.processed_rows,
                total_rows: job.total_rows,
                progress: job.progress,
                estimated_time_remaining_seconds: job.estimated_time_remaining_seconds,
            }
        };

        if let JobEvent::JobProgress {
            processed_rows,
            total_rows,
            progress,
            ..
        } = &event
        {
            log::info!(
                "Job {}: {}/{} rows ({:.1}%)",
                job_id,
                processed_rows,
                total_rows,
                progress
            );
        }
        self.events.emit(event);
    }

    /// Stores the settled rows and completes the job if it was not paused.
    fn finish_run(
        &self,
        job_id: &str,
        pending: Vec<PendingRow>,
        outcomes: Vec<Result<Vec<SearchMatch>, DispatchError>>,
    ) {
        let event = {
            let mut state = self.state.lock();
            let Some(entry) = state.jobs.get_mut(job_id) else {
                return;
            };
            let job = &mut entry.job;
            if job.status.is_terminal() {
                return;
            }
            for (row, outcome) in pending.into_iter().zip(outcomes) {
                if let Some(result) = to_bulk_result(row, outcome) {
                    job.insert_result(result);
                }
            }
            if job.status != JobStatus::Processing {
                log::info!(
                    "Job {} halted with {} of {} rows processed ({})",
                    job_id,
                    job.processed_rows,
                    job.total_rows,
                    job.status
                );
                return;
            }
            job.status = JobStatus::Completed;
            job.progress = 100.0;
            job.estimated_time_remaining_seconds = Some(0.0);
            job.end_time_ms = Some(chrono::Utc::now().timestamp_millis());
            JobEvent::JobCompleted {
                job_id: job_id.to_string(),
                successful_searches: job.successful_searches,
                failed_searches: job.failed_searches,
            }
        };

        if let JobEvent::JobCompleted {
            successful_searches,
            failed_searches,
            ..
        } = &event
        {
            log::info!(
                "Job {} completed: {} successful, {} failed",
                job_id,
                successful_searches,
                failed_searches
            );
        }
        self.events.emit(event);
    }

    fn fail_job(&self, job_id: &str, error: &JobError) {
        {
            let mut state = self.state.lock();
            let Some(entry) = state.jobs.get_mut(job_id) else {
                return;
            };
            if entry.job.status.is_terminal() {
                return;
            }
            entry.job.status = JobStatus::Failed;
            entry.job.end_time_ms = Some(chrono::Utc::now().timestamp_millis());
            entry.job.estimated_time_remaining_seconds = None;
            entry.job.error = Some(error.to_string());
        }
        log::error!("Job {} failed: {}", job_id, error);
        self.events.emit(JobEvent::JobFailed {
            job_id: job_id.to_string(),
            error: error.to_string(),
        });
    }

    fn cleanup_finished_jobs(&self) -> usize {
        let removed = {
            let mut state = self.state.lock();
            let mut finished: Vec<(i64, u64, String)> = state
                .jobs
                .iter()
                .filter(|(_, entry)| entry.job.status.is_terminal())
                .map(|(id, entry)| {
                    let started = entry.job.start_time_ms.unwrap_or(entry.job.created_at_ms);
                    (started, entry.seq, id.clone())
                })
                .collect();
            if finished.len() <= self.config.retention_count {
                return 0;
            }
            // Most recently started first
            finished.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
            let evicted = finished.split_off(self.config.retention_count);
            for (_, _, id) in &evicted {
                state.jobs.remove(id);
            }
            evicted.len()
        };

        log::info!("Cleaned up {} finished jobs", removed);
        self.events.emit(JobEvent::JobsCleanedUp { removed });
        removed
    }
}

fn to_bulk_result(
    pending: PendingRow,
    outcome: Result<Vec<SearchMatch>, DispatchError>,
) -> Option<BulkResult> {
    let (found_matches, error) = match outcome {
        Ok(matches) => (matches, None),
        // Never started; the row is picked up again on resume
        Err(DispatchError::Halted) => return None,
        Err(e) => (Vec::new(), Some(e.to_string())),
    };
    Some(BulkResult {
        row: pending.row,
        search_criteria: pending.criteria,
        success: !found_matches.is_empty() && error.is_none(),
        found_matches,
        search_method: pending.method,
        processing_time_ms: pending.probe.elapsed_ms(),
        attempts: pending.probe.attempts(),
        error,
    })
}

/// Builds one limiter request per searchable row that has no result yet.
///
/// Returns the requests, the matching row metadata and the number of
/// unsearchable rows.
fn build_requests(
    job_id: &str,
    rows: &[Row],
    done: &[usize],
    search: &Arc<dyn CatalogSearch>,
) -> (Vec<BatchRequest<Vec<SearchMatch>>>, Vec<PendingRow>, usize) {
    let mut requests = Vec::new();
    let mut pending = Vec::new();
    let mut skipped = 0;

    for (index, raw) in rows.iter().enumerate() {
        let row = index + 1;
        let query = RowQuery::from_row(raw);
        let (Some(priority), Some(method)) = (query.priority(), query.method()) else {
            skipped += 1;
            continue;
        };
        if done.binary_search(&row).is_ok() {
            continue;
        }

        let probe = RowProbe::default();
        let criteria = query.criteria();
        let query = Arc::new(query);
        let search = Arc::clone(search);
        let op_probe = probe.clone();
        requests.push(BatchRequest::new(
            format!("{}-row-{}", job_id, row),
            priority,
            move || {
                let search = Arc::clone(&search);
                let query = Arc::clone(&query);
                let probe = op_probe.clone();
                async move {
                    probe.attempt_started();
                    let result = lookup_row(search.as_ref(), &query).await;
                    probe.attempt_finished();
                    result
                }
            },
        ));
        pending.push(PendingRow {
            row,
            criteria,
            method,
            probe,
        });
    }

    (requests, pending, skipped)
}

async fn process_job(inner: Arc<ProcessorInner>, job_id: String) {
    let Some(run) = inner.begin_job(&job_id) else {
        return;
    };

    let (requests, pending, skipped) = build_requests(&job_id, &run.rows, &run.done, &inner.search);
    inner.set_skipped_rows(&job_id, skipped);
    if skipped > 0 {
        log::warn!("Job {}: skipping {} rows with nothing to search by", job_id, skipped);
    }

    let run_started = Instant::now();
    let mut throttle = ProgressThrottle::new(inner.config.progress_interval);
    let base = run.base;
    let progress_inner = Arc::clone(&inner);
    let progress_id = job_id.clone();
    let on_progress = move |batch: BatchProgress| {
        progress_inner.record_progress(
            &progress_id,
            base,
            batch,
            run_started.elapsed(),
            &mut throttle,
        );
    };

    let halt_inner = Arc::clone(&inner);
    let halt_id = job_id.clone();
    let halt_token = run.cancel.clone();
    let should_halt = move || {
        halt_token.is_cancelled() || halt_inner.job_status(&halt_id) != Some(JobStatus::Processing)
    };

    let outcomes = tokio::select! {
        outcomes = inner.limiter.execute_batch_until(requests, on_progress, should_halt) => outcomes,
        _ = run.cancel.cancelled() => {
            log::info!("Job {}: abandoning in-flight lookups", job_id);
            return;
        }
    };

    inner.finish_run(&job_id, pending, outcomes);
}

fn spawn_drain_loop(inner: &Arc<ProcessorInner>) {
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        while let Some(job_id) = inner.next_queued_job() {
            let task = tokio::spawn(process_job(Arc::clone(&inner), job_id.clone()));
            if let Err(e) = task.await {
                inner.fail_job(&job_id, &JobError::Panicked(e.to_string()));
            }
            inner.cleanup_finished_jobs();
        }
        log::debug!("Job queue drained");
    });
}

fn spawn_cleanup_task(inner: &Arc<ProcessorInner>) {
    let weak = Arc::downgrade(inner);
    let shutdown = inner.shutdown.clone();
    let mut ticker = interval(inner.config.cleanup_interval);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    inner.cleanup_finished_jobs();
                }
                _ = shutdown.cancelled() => {
                    log::debug!("Job cleanup task shutting down");
                    break;
                }
            }
        }
    });
}
