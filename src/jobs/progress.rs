//! Progress throttling and ETA.

use std::time::Duration;

use tokio::time::Instant;

/// Gate that lets at most one emission through per interval.
///
/// The first call is always let through.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl ProgressThrottle {
    /// Creates a throttle with the given minimum spacing.
    pub fn new(interval: Duration) -> Self {
        ProgressThrottle {
            interval,
            last_emit: None,
        }
    }

    /// Returns `true` (and records the emission) if `interval` has passed
    /// since the last emission.
    pub fn ready(&mut self, now: Instant) -> bool {
        let due = self
            .last_emit
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last_emit = Some(now);
        }
        due
    }
}

/// Seconds left at the observed throughput, `None` before any row settled.
pub fn estimate_remaining_seconds(remaining: usize, processed: usize, elapsed: Duration) -> Option<f64> {
    let elapsed = elapsed.as_secs_f64();
    if processed == 0 || elapsed <= 0.0 {
        return None;
    }
    let rate = processed as f64 / elapsed;
    Some(remaining as f64 / rate)
}

/// Percentage of `total` that `processed` represents, capped at 100.
pub fn percent(processed: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (processed as f64 / total as f64 * 100.0).min(100.0)
}
