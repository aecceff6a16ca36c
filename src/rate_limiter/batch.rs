//! Batch execution on top of the limiter.
//!
//! Requests are split into sub-batches of `batch_size`. Within a sub-batch,
//! submissions are staggered and awaited concurrently; sub-batches run one
//! after another with a fixed pause in between.

use std::future::Future;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::time::sleep;

use super::RateLimiter;
use crate::config::{BATCH_STAGGER_DELAY, INTER_BATCH_DELAY};
use crate::error_handling::{DispatchError, OperationError};

type BatchOperation<T> = Box<dyn FnMut() -> BoxFuture<'static, Result<T, OperationError>> + Send>;

/// One entry of a batch.
pub struct BatchRequest<T> {
    /// Request id used in events and logs
    pub id: String,
    /// Queue priority, higher first
    pub priority: i32,
    operation: BatchOperation<T>,
}

impl<T: Send + 'static> BatchRequest<T> {
    /// Wraps a re-callable operation.
    pub fn new<F, Fut>(id: impl Into<String>, priority: i32, mut operation: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, OperationError>> + Send + 'static,
    {
        BatchRequest {
            id: id.into(),
            priority,
            operation: Box::new(move || operation().boxed()),
        }
    }
}

impl<T> std::fmt::Debug for BatchRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRequest")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Progress reported after each settled request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Requests settled so far
    pub processed: usize,
    /// Requests in the batch
    pub total: usize,
    /// Settled requests that ended in an error
    pub failed: usize,
}

impl RateLimiter {
    /// Runs every request through the limiter.
    ///
    /// The returned vector is index-aligned with `requests`: entry `i` is the
    /// result of request `i`, regardless of completion order. `on_progress`
    /// fires once per settled request.
    pub async fn execute_batch<T, P>(
        &self,
        requests: Vec<BatchRequest<T>>,
        on_progress: P,
    ) -> Vec<Result<T, DispatchError>>
    where
        T: Send + 'static,
        P: FnMut(BatchProgress),
    {
        self.execute_batch_until(requests, on_progress, || false)
            .await
    }

    /// Like `execute_batch`, but checks `should_halt` before each sub-batch.
    ///
    /// Once `should_halt` returns `true` no further sub-batch is started;
    /// the in-flight one is awaited, and requests that never started are
    /// reported as `DispatchError::Halted` without a progress callback.
    pub async fn execute_batch_until<T, P, H>(
        &self,
        requests: Vec<BatchRequest<T>>,
        mut on_progress: P,
        should_halt: H,
    ) -> Vec<Result<T, DispatchError>>
    where
        T: Send + 'static,
        P: FnMut(BatchProgress),
        H: Fn() -> bool,
    {
        let total = requests.len();
        let batch_size = self.config().batch_size.max(1);
        let mut results: Vec<Option<Result<T, DispatchError>>> =
            std::iter::repeat_with(|| None).take(total).collect();
        let mut processed = 0;
        let mut failed = 0;

        let mut pending = requests.into_iter().enumerate().peekable();
        let mut sub_batch = 0usize;
        while pending.peek().is_some() {
            if should_halt() {
                log::info!(
                    "Batch halted after {} of {} requests",
                    processed,
                    total
                );
                break;
            }
            if sub_batch > 0 {
                sleep(INTER_BATCH_DELAY).await;
                if should_halt() {
                    log::info!(
                        "Batch halted after {} of {} requests",
                        processed,
                        total
                    );
                    break;
                }
            }
            sub_batch += 1;

            let chunk: Vec<_> = pending.by_ref().take(batch_size).collect();
            log::debug!(
                "Starting sub-batch {} ({} requests, {} of {} settled)",
                sub_batch,
                chunk.len(),
                processed,
                total
            );

            let mut in_flight = FuturesUnordered::new();
            for (offset, (index, request)) in chunk.into_iter().enumerate() {
                let limiter = self.clone();
                let stagger = BATCH_STAGGER_DELAY * u32::try_from(offset).unwrap_or(u32::MAX);
                in_flight.push(async move {
                    if !stagger.is_zero() {
                        sleep(stagger).await;
                    }
                    let BatchRequest {
                        id,
                        priority,
                        operation,
                    } = request;
                    let result = limiter.execute_request(operation, priority, id).await;
                    (index, result)
                });
            }

            while let Some((index, result)) = in_flight.next().await {
                processed += 1;
                if result.is_err() {
                    failed += 1;
                }
                results[index] = Some(result);
                on_progress(BatchProgress {
                    processed,
                    total,
                    failed,
                });
            }
        }

        results
            .into_iter()
            .map(|result| result.unwrap_or(Err(DispatchError::Halted)))
            .collect()
    }
}
