//! Request outcome statistics.
//!
//! Thread-safe counters for what happened to dispatched requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;

use super::types::OutcomeType;

/// Thread-safe outcome tracker.
///
/// Uses atomic counters so the dispatch tasks can record outcomes without
/// taking the limiter lock. All outcome types are initialized to zero on
/// creation.
pub struct OutcomeStats {
    outcomes: HashMap<OutcomeType, AtomicUsize>,
}

impl OutcomeStats {
    /// Creates a tracker with every counter at zero.
    pub fn new() -> Self {
        let mut outcomes = HashMap::new();
        for outcome in OutcomeType::iter() {
            outcomes.insert(outcome, AtomicUsize::new(0));
        }
        OutcomeStats { outcomes }
    }

    /// Increment an outcome counter.
    pub fn increment(&self, outcome: OutcomeType) {
        if let Some(counter) = self.outcomes.get(&outcome) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment outcome counter for {:?} which is not in the map",
                outcome
            );
        }
    }

    /// Add `n` to an outcome counter.
    pub fn add(&self, outcome: OutcomeType, n: usize) {
        if let Some(counter) = self.outcomes.get(&outcome) {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    /// Get the count for an outcome type.
    pub fn get(&self, outcome: OutcomeType) -> usize {
        self.outcomes
            .get(&outcome)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Requests that ended in a final failure.
    pub fn total_failures(&self) -> usize {
        self.get(OutcomeType::RateLimited) + self.get(OutcomeType::NonRetryable)
    }

    /// Snapshot of every counter keyed by its stable name.
    pub fn snapshot(&self) -> HashMap<&'static str, usize> {
        OutcomeType::iter()
            .map(|outcome| (outcome.as_str(), self.get(outcome)))
            .collect()
    }
}

impl Default for OutcomeStats {
    fn default() -> Self {
        Self::new()
    }
}
