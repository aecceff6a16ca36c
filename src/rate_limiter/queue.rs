//! Priority-ordered request queue.
//!
//! Requests are kept sorted by priority (descending), FIFO within a priority.
//! A retried request re-enters at the head of its own priority band.

use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error_handling::{DispatchError, OperationError};

pub(crate) type ErasedValue = Box<dyn Any + Send>;
type Operation = Box<dyn FnMut() -> BoxFuture<'static, Result<ErasedValue, OperationError>> + Send>;
type Responder = Box<dyn FnOnce(Result<ErasedValue, DispatchError>) + Send>;

/// A request owned by the limiter until it settles.
pub(crate) struct QueuedRequest {
    pub id: String,
    pub priority: i32,
    #[allow(dead_code)] // Kept for debugging queue latency
    pub enqueued_at: Instant,
    pub retry_count: u32,
    operation: Operation,
    responder: Responder,
}

impl QueuedRequest {
    /// Wraps a typed operation, returning the request and the receiver the
    /// caller awaits for the final result.
    pub fn new<T, F, Fut>(
        id: String,
        priority: i32,
        mut op: F,
    ) -> (Self, oneshot::Receiver<Result<T, DispatchError>>)
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, OperationError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let operation: Operation = Box::new(move || {
            let fut = op();
            async move { fut.await.map(|value| Box::new(value) as ErasedValue) }.boxed()
        });
        let responder: Responder = Box::new(move |result| {
            let typed = result.and_then(|value| {
                value.downcast::<T>().map(|v| *v).map_err(|_| {
                    DispatchError::Internal("operation returned an unexpected type".into())
                })
            });
            // The caller may have stopped waiting (cancelled job)
            let _ = tx.send(typed);
        });
        let request = QueuedRequest {
            id,
            priority,
            enqueued_at: Instant::now(),
            retry_count: 0,
            operation,
            responder,
        };
        (request, rx)
    }

    /// Starts one attempt of the operation.
    pub fn attempt(&mut self) -> BoxFuture<'static, Result<ErasedValue, OperationError>> {
        (self.operation)()
    }

    /// Delivers the final result to the caller.
    pub fn settle(self, result: Result<ErasedValue, DispatchError>) {
        (self.responder)(result)
    }
}

impl std::fmt::Debug for QueuedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedRequest")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("retry_count", &self.retry_count)
            .finish()
    }
}

/// Queue sorted by priority descending.
#[derive(Debug, Default)]
pub(crate) struct RequestQueue {
    items: VecDeque<QueuedRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        RequestQueue {
            items: VecDeque::new(),
        }
    }

    /// Inserts behind every request of equal or higher priority.
    pub fn push(&mut self, request: QueuedRequest) {
        let index = self
            .items
            .iter()
            .position(|queued| queued.priority < request.priority)
            .unwrap_or(self.items.len());
        self.items.insert(index, request);
    }

    /// Inserts ahead of waiting requests of the same priority.
    pub fn push_retry(&mut self, request: QueuedRequest) {
        let index = self
            .items
            .iter()
            .position(|queued| queued.priority <= request.priority)
            .unwrap_or(self.items.len());
        self.items.insert(index, request);
    }

    pub fn pop(&mut self) -> Option<QueuedRequest> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Removes every pending request.
    pub fn drain(&mut self) -> Vec<QueuedRequest> {
        self.items.drain(..).collect()
    }
}
