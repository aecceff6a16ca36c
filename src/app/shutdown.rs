//! Graceful shutdown handling.

use tokio_util::sync::CancellationToken;

use crate::jobs::BulkJobProcessor;

/// Shuts down all background tasks gracefully.
///
/// Stops the progress logging task first, then the processor (cleanup task
/// and drain loop) and finally the rate limiter, which rejects anything still
/// queued.
pub async fn shutdown_gracefully(
    cancel: CancellationToken,
    logging_task: Option<tokio::task::JoinHandle<()>>,
    processor: &BulkJobProcessor,
) {
    cancel.cancel();
    if let Some(logging_task) = logging_task {
        let _ = logging_task.await;
    }

    processor.shutdown();
    processor.rate_limiter().shutdown();
}
