//! Admission control for a single upstream quota.
//!
//! This module implements a rate limiter that combines:
//! - A token bucket for steady-state throughput (refilled every 100ms)
//! - A priority queue served by a single dispatch loop
//! - Exponential backoff with jitter for rate-limited failures
//! - A circuit breaker that suspends all traffic after sustained failures
//!
//! The queue, bucket and breaker live behind one lock. Only the dispatch loop
//! dequeues and consumes tokens, and at most one loop runs at a time.

mod batch;
mod breaker;
mod bucket;
mod queue;
mod retry;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::{interval, sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::{
    ConfigError, RateLimiterConfig, BREAKER_POLL_MAX, INTER_REQUEST_DELAY, TOKEN_REFILL_INTERVAL,
    TOKEN_WAIT_INTERVAL,
};
use crate::error_handling::{DispatchError, OperationError, OutcomeStats, OutcomeType};
use crate::events::{EventBus, LimiterEvent};

pub use batch::{BatchProgress, BatchRequest};
use breaker::{BreakerTransition, CircuitBreaker};
use bucket::TokenBucket;
use queue::{ErasedValue, QueuedRequest, RequestQueue};
use retry::RetryDecision;

/// Point-in-time view of the limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimiterStatus {
    /// Requests waiting in the queue
    pub queue_length: usize,
    /// Requests currently running against the upstream
    pub active_requests: usize,
    /// Whole tokens available in the bucket
    pub current_tokens: u32,
    /// Whether dispatching is suspended
    pub circuit_breaker_open: bool,
    /// Consecutive final failure count
    pub failure_count: u32,
}

struct LimiterState {
    bucket: TokenBucket,
    queue: RequestQueue,
    breaker: CircuitBreaker,
    /// A dispatch loop is running
    processing: bool,
    /// `shutdown()` was called
    closed: bool,
}

struct Inner {
    config: RateLimiterConfig,
    state: Mutex<LimiterState>,
    active_requests: AtomicUsize,
    stats: OutcomeStats,
    events: EventBus<LimiterEvent>,
    shutdown: CancellationToken,
}

enum Step {
    Idle,
    Wait(Duration),
    Dispatch(QueuedRequest),
}

/// Decrements the active-request count even if the operation panics.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Rate limiter shared by every caller of one upstream quota.
///
/// Cloning is cheap and yields a handle to the same queue, bucket and breaker.
///
/// # Runtime
///
/// `new` spawns the token refill task, so it must be called from within a
/// Tokio runtime.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl RateLimiter {
    /// Creates a limiter and starts its token refill task.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is not usable (see
    /// `RateLimiterConfig::validate`).
    pub fn new(config: RateLimiterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let now = Instant::now();
        let state = LimiterState {
            bucket: TokenBucket::new(config.max_burst_requests, config.max_requests_per_second, now),
            queue: RequestQueue::new(),
            breaker: CircuitBreaker::new(
                config.circuit_breaker_threshold,
                config.circuit_breaker_cooldown(),
            ),
            processing: false,
            closed: false,
        };
        log::info!(
            "Rate limiter initialized ({} req/s, burst {}, {} retries, breaker threshold {})",
            config.max_requests_per_second,
            config.max_burst_requests,
            config.max_retries,
            config.circuit_breaker_threshold
        );
        let inner = Arc::new(Inner {
            config,
            state: Mutex::new(state),
            active_requests: AtomicUsize::new(0),
            stats: OutcomeStats::new(),
            events: EventBus::new(),
            shutdown: CancellationToken::new(),
        });
        spawn_refill_task(&inner);
        Ok(RateLimiter { inner })
    }

    /// Runs `op` under the limiter and returns its final result.
    ///
    /// The request is queued by `priority` (higher first, FIFO within a
    /// priority). Rate-limited failures are retried internally with backoff;
    /// the caller only sees the final success or failure.
    ///
    /// `op` is called once per attempt, so it must be able to start the
    /// operation again.
    pub async fn execute_request<T, F, Fut>(
        &self,
        op: F,
        priority: i32,
        id: impl Into<String>,
    ) -> Result<T, DispatchError>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, OperationError>> + Send + 'static,
    {
        let id = id.into();
        let (request, rx) = QueuedRequest::new(id.clone(), priority, op);

        let (queue_length, start) = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(DispatchError::ShutDown);
            }
            state.queue.push(request);
            let start = !state.processing;
            state.processing = true;
            (state.queue.len(), start)
        };

        log::debug!(
            "Request {} queued (priority {}, queue length {})",
            id,
            priority,
            queue_length
        );
        self.inner.events.emit(LimiterEvent::RequestQueued {
            id,
            priority,
            queue_length,
        });

        if start {
            spawn_dispatch_loop(&self.inner);
        }

        rx.await.unwrap_or_else(|_| {
            Err(DispatchError::Internal(
                "request dropped before completion".into(),
            ))
        })
    }

    /// Current queue, token and breaker state.
    ///
    /// Also closes the breaker if its cooldown has elapsed.
    pub fn status(&self) -> RateLimiterStatus {
        let now = Instant::now();
        let (status, transition) = {
            let mut state = self.inner.state.lock();
            let transition = state.breaker.poll(now);
            let status = RateLimiterStatus {
                queue_length: state.queue.len(),
                active_requests: self.inner.active_requests.load(Ordering::SeqCst),
                current_tokens: state.bucket.available(),
                circuit_breaker_open: state.breaker.is_open(now),
                failure_count: state.breaker.failure_count(),
            };
            (status, transition)
        };
        self.inner.emit_transition(transition);
        status
    }

    /// Rejects every pending request with `DispatchError::Cleared`.
    ///
    /// In-flight requests are not affected. Returns the number of requests
    /// removed.
    pub fn clear_queue(&self) -> usize {
        let drained = self.inner.state.lock().queue.drain();
        let count = drained.len();
        for request in drained {
            request.settle(Err(DispatchError::Cleared));
        }
        self.inner.stats.add(OutcomeType::Cleared, count);
        log::warn!("Request queue cleared ({} pending requests rejected)", count);
        self.inner.events.emit(LimiterEvent::QueueCleared { count });
        count
    }

    /// Stops the refill task and the dispatch loop, rejecting pending
    /// requests with `DispatchError::ShutDown`.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let drained = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.queue.drain()
        };
        for request in drained {
            request.settle(Err(DispatchError::ShutDown));
        }
        log::debug!("Rate limiter shut down");
    }

    /// Subscribes to limiter events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<LimiterEvent> {
        self.inner.events.subscribe()
    }

    /// Outcome counters since construction.
    pub fn stats(&self) -> &OutcomeStats {
        &self.inner.stats
    }

    /// The limiter's configuration.
    pub fn config(&self) -> &RateLimiterConfig {
        &self.inner.config
    }
}

impl Inner {
    fn emit_transition(&self, transition: Option<BreakerTransition>) {
        match transition {
            Some(BreakerTransition::Closed) => self.events.emit(LimiterEvent::CircuitBreakerClosed),
            Some(BreakerTransition::Opened) => {
                let (failure_count, cooldown) = {
                    let state = self.state.lock();
                    (state.breaker.failure_count(), state.breaker.cooldown())
                };
                self.events.emit(LimiterEvent::CircuitBreakerOpen {
                    failure_count,
                    cooldown,
                })
            }
            None => {}
        }
    }

    /// Called by the refill task every tick.
    fn refill_tick(self: &Arc<Self>) {
        let now = Instant::now();
        let (start, transition) = {
            let mut state = self.state.lock();
            let has_tokens = state.bucket.refill(now);
            let transition = state.breaker.poll(now);
            let start = has_tokens && !state.queue.is_empty() && !state.processing && !state.closed;
            if start {
                state.processing = true;
            }
            (start, transition)
        };
        self.emit_transition(transition);
        if start {
            spawn_dispatch_loop(self);
        }
    }

    /// Decides what the dispatch loop does next.
    fn next_step(&self) -> Step {
        let now = Instant::now();
        let (step, transition) = {
            let mut state = self.state.lock();
            if state.closed || state.queue.is_empty() {
                state.processing = false;
                return Step::Idle;
            }
            let transition = state.breaker.poll(now);
            let step = if let Some(remaining) = state.breaker.remaining(now) {
                Step::Wait(remaining.min(BREAKER_POLL_MAX))
            } else {
                state.bucket.refill(now);
                if state.bucket.try_consume() {
                    match state.queue.pop() {
                        Some(request) => Step::Dispatch(request),
                        None => Step::Idle,
                    }
                } else {
                    Step::Wait(TOKEN_WAIT_INTERVAL)
                }
            };
            if matches!(step, Step::Idle) {
                state.processing = false;
            }
            (step, transition)
        };
        self.emit_transition(transition);
        step
    }

    /// Runs one attempt of `request` on its own task.
    fn dispatch(self: &Arc<Self>, mut request: QueuedRequest) {
        let inner = Arc::clone(self);
        inner.active_requests.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            let outcome = {
                let _active = ActiveGuard(&inner.active_requests);
                request.attempt().await
            };
            inner.handle_outcome(request, outcome).await;
        });
    }

    async fn handle_outcome(
        self: &Arc<Self>,
        mut request: QueuedRequest,
        outcome: Result<ErasedValue, OperationError>,
    ) {
        match RetryDecision::from_outcome(outcome, request.retry_count, &self.config) {
            RetryDecision::Success(value) => {
                self.state.lock().breaker.record_success();
                self.stats.increment(OutcomeType::Success);
                log::debug!("Request {} succeeded", request.id);
                self.events.emit(LimiterEvent::RequestSuccess {
                    id: request.id.clone(),
                });
                request.settle(Ok(value));
            }
            RetryDecision::Retry(delay) => {
                request.retry_count += 1;
                self.stats.increment(OutcomeType::Retried);
                log::info!(
                    "Request {} rate limited, retry {}/{} in {}ms",
                    request.id,
                    request.retry_count,
                    self.config.max_retries,
                    delay.as_millis()
                );
                self.events.emit(LimiterEvent::RequestRetry {
                    id: request.id.clone(),
                    retry_count: request.retry_count,
                    delay,
                });
                tokio::select! {
                    _ = sleep(delay) => self.requeue(request),
                    _ = self.shutdown.cancelled() => request.settle(Err(DispatchError::ShutDown)),
                }
            }
            RetryDecision::Fail {
                error,
                rate_limited,
            } => {
                let now = Instant::now();
                let (closed, opened) = {
                    let mut state = self.state.lock();
                    let closed = state.breaker.poll(now);
                    let opened = state.breaker.record_failure(now);
                    (closed, opened)
                };
                self.emit_transition(closed);
                self.stats.increment(if rate_limited {
                    OutcomeType::RateLimited
                } else {
                    OutcomeType::NonRetryable
                });
                log::warn!(
                    "Request {} failed after {} retries: {}",
                    request.id,
                    request.retry_count,
                    error
                );
                self.events.emit(LimiterEvent::RequestFailure {
                    id: request.id.clone(),
                    error: error.to_string(),
                });
                self.emit_transition(opened);
                request.settle(Err(DispatchError::Operation(error)));
            }
        }
    }

    /// Puts a retried request back at the head of its priority band.
    fn requeue(self: &Arc<Self>, request: QueuedRequest) {
        let start = {
            let mut state = self.state.lock();
            if state.closed {
                drop(state);
                request.settle(Err(DispatchError::ShutDown));
                return;
            }
            state.queue.push_retry(request);
            let start = !state.processing;
            state.processing = true;
            start
        };
        if start {
            spawn_dispatch_loop(self);
        }
    }
}

fn spawn_dispatch_loop(inner: &Arc<Inner>) {
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        loop {
            match inner.next_step() {
                Step::Idle => break,
                Step::Wait(delay) => {
                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = inner.shutdown.cancelled() => break,
                    }
                }
                Step::Dispatch(request) => {
                    inner.dispatch(request);
                    tokio::select! {
                        _ = sleep(INTER_REQUEST_DELAY) => {}
                        _ = inner.shutdown.cancelled() => break,
                    }
                }
            }
        }
    });
}

fn spawn_refill_task(inner: &Arc<Inner>) {
    let weak = Arc::downgrade(inner);
    let shutdown = inner.shutdown.clone();
    let mut ticker = interval(TOKEN_REFILL_INTERVAL);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    inner.refill_tick();
                }
                _ = shutdown.cancelled() => {
                    log::debug!("Rate limiter refill task shutting down");
                    break;
                }
            }
        }
    });
}
