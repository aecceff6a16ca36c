//! Circuit breaker for the upstream quota.
//!
//! After N consecutive final failures the circuit opens and the dispatch loop
//! stops dequeuing until a cooldown period expires. Queued requests are
//! deferred, not rejected.

use std::time::Duration;

use tokio::time::Instant;

/// State change caused by recording an outcome or checking the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BreakerTransition {
    /// The breaker just opened
    Opened,
    /// The cooldown expired and the breaker closed
    Closed,
}

/// Consecutive-failure circuit breaker.
///
/// Not internally synchronized: the limiter mutates it under its state lock.
#[derive(Debug)]
pub(crate) struct CircuitBreaker {
    /// Number of consecutive failures before opening circuit
    failure_threshold: u32,
    /// How long the circuit stays open
    cooldown_duration: Duration,
    /// Current consecutive failure count
    failure_count: u32,
    /// Deadline while the circuit is open
    open_until: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown_duration: Duration) -> Self {
        CircuitBreaker {
            failure_threshold,
            cooldown_duration,
            failure_count: 0,
            open_until: None,
        }
    }

    /// Records a successful operation.
    ///
    /// Walks the failure count back toward zero rather than resetting it.
    pub fn record_success(&mut self) {
        self.failure_count = self.failure_count.saturating_sub(1);
    }

    /// Records a final failure.
    ///
    /// Opens the circuit when the threshold is reached and it is not open yet.
    pub fn record_failure(&mut self, now: Instant) -> Option<BreakerTransition> {
        self.failure_count = self.failure_count.saturating_add(1);
        if self.failure_count >= self.failure_threshold && self.open_until.is_none() {
            self.open_until = Some(now + self.cooldown_duration);
            log::error!(
                "Circuit breaker opened after {} consecutive failures (cooldown: {}ms)",
                self.failure_count,
                self.cooldown_duration.as_millis()
            );
            return Some(BreakerTransition::Opened);
        }
        None
    }

    /// Lazily closes the circuit once the cooldown has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<BreakerTransition> {
        match self.open_until {
            Some(until) if now >= until => {
                self.open_until = None;
                self.failure_count = 0;
                log::info!("Circuit breaker: cooldown expired, circuit closed");
                Some(BreakerTransition::Closed)
            }
            _ => None,
        }
    }

    /// Time left before the circuit closes, `None` when closed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.open_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    pub fn is_open(&self, now: Instant) -> bool {
        self.remaining(now).is_some()
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown_duration
    }
}
