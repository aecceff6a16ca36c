//! Typed notifications for observers.
//!
//! The rate limiter and the job processor each own a `broadcast` channel of
//! events. Emitting never blocks and never fails: with no subscribers the
//! event is only logged.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::EVENT_CHANNEL_CAPACITY;

/// Rate limiter lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LimiterEvent {
    /// A request entered the queue.
    RequestQueued {
        /// Request id
        id: String,
        /// Request priority
        priority: i32,
        /// Queue length after insertion
        queue_length: usize,
    },
    /// A throttled attempt will be resubmitted after `delay`.
    RequestRetry {
        /// Request id
        id: String,
        /// Retry number (1-based)
        retry_count: u32,
        /// Backoff before resubmission
        #[serde(with = "duration_ms")]
        delay: Duration,
    },
    /// A request completed successfully.
    RequestSuccess {
        /// Request id
        id: String,
    },
    /// A request failed for good.
    RequestFailure {
        /// Request id
        id: String,
        /// Final error message
        error: String,
    },
    /// All dispatching is suspended for `cooldown`.
    CircuitBreakerOpen {
        /// Consecutive failure count that tripped the breaker
        failure_count: u32,
        /// How long the breaker stays open
        #[serde(with = "duration_ms")]
        cooldown: Duration,
    },
    /// Dispatching resumed after the cooldown.
    CircuitBreakerClosed,
    /// Pending requests were drained.
    QueueCleared {
        /// Number of requests rejected
        count: usize,
    },
}

/// Job lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// The drain loop began (or resumed) processing a job.
    JobStarted {
        /// Job id
        job_id: String,
        /// Rows in the job
        total_rows: usize,
    },
    /// Throttled progress snapshot.
    JobProgress {
        /// Job id
        job_id: String,
        /// Rows settled so far
        processed_rows: usize,
        /// Rows in the job
        total_rows: usize,
        /// Percentage, 0..=100
        progress: f64,
        /// Remaining time estimate
        estimated_time_remaining_seconds: Option<f64>,
    },
    /// Job finished with all rows settled.
    JobCompleted {
        /// Job id
        job_id: String,
        /// Rows whose lookup did not error
        successful_searches: usize,
        /// Rows whose lookup errored
        failed_searches: usize,
    },
    /// Job-level fault.
    JobFailed {
        /// Job id
        job_id: String,
        /// Fault description
        error: String,
    },
    /// Job paused by request.
    JobPaused {
        /// Job id
        job_id: String,
    },
    /// Job re-queued after a pause.
    JobResumed {
        /// Job id
        job_id: String,
    },
    /// Job cancelled by request.
    JobCancelled {
        /// Job id
        job_id: String,
    },
    /// Old finished jobs were evicted.
    JobsCleanedUp {
        /// Number of jobs removed
        removed: usize,
    },
}

/// Broadcast sender wrapper shared by both components.
#[derive(Debug, Clone)]
pub struct EventBus<E: Clone> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    /// Creates a bus with the default channel capacity.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        EventBus { sender }
    }

    /// Publishes an event; a missing audience is not an error.
    pub fn emit(&self, event: E) {
        let _ = self.sender.send(event);
    }

    /// Subscribes to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
