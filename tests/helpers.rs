// Shared test helpers: a scripted catalog and row builders.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use bulk_lookup::{
    BulkJobProcessor, CatalogSearch, OperationError, ProcessorConfig, RateLimiter,
    RateLimiterConfig, Row, SearchMatch,
};

/// In-memory catalog whose failures are scripted per call key.
///
/// Keys look like `upc:0123`, `mpn:AB-1` or `text:blue widget`. Unscripted
/// calls succeed with a single match whose id is the key.
#[derive(Default)]
pub struct FakeCatalog {
    scripted: Mutex<HashMap<String, VecDeque<OperationError>>>,
    always: Mutex<Option<OperationError>>,
    calls: Mutex<Vec<String>>,
    latency: Duration,
}

#[allow(dead_code)] // Each test file uses a different subset
impl FakeCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(FakeCatalog {
            latency,
            ..Default::default()
        })
    }

    /// The next call for `key` fails with `error`.
    pub fn fail_next(&self, key: &str, error: OperationError) {
        self.scripted
            .lock()
            .entry(key.to_string())
            .or_default()
            .push_back(error);
    }

    /// Every call fails with `error`.
    pub fn fail_always(&self, error: OperationError) {
        *self.always.lock() = Some(error);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, key: &str) -> usize {
        self.calls.lock().iter().filter(|call| *call == key).count()
    }

    async fn respond(&self, key: String) -> Result<Vec<SearchMatch>, OperationError> {
        self.calls.lock().push(key.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(error) = self.always.lock().clone() {
            return Err(error);
        }
        let scripted = self
            .scripted
            .lock()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front());
        match scripted {
            Some(error) => Err(error),
            None => Ok(vec![SearchMatch::new(key, "Catalog entry")]),
        }
    }
}

#[async_trait]
impl CatalogSearch for FakeCatalog {
    async fn search_by_upc(&self, upc: &str) -> Result<Vec<SearchMatch>, OperationError> {
        self.respond(format!("upc:{}", upc)).await
    }

    async fn search_by_mpn(&self, mpn: &str) -> Result<Vec<SearchMatch>, OperationError> {
        self.respond(format!("mpn:{}", mpn)).await
    }

    async fn search_by_text(&self, text: &str) -> Result<Vec<SearchMatch>, OperationError> {
        self.respond(format!("text:{}", text)).await
    }
}

/// Builds a row from column/value pairs.
#[allow(dead_code)]
pub fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(column, value)| (column.to_string(), value.to_string()))
        .collect()
}

/// `count` rows with distinct UPCs `{prefix}0`, `{prefix}1`, ...
#[allow(dead_code)]
pub fn upc_rows(prefix: &str, count: usize) -> Vec<Row> {
    (0..count)
        .map(|i| row(&[("upc", &format!("{}{}", prefix, i))]))
        .collect()
}

/// Limiter settings that keep paused-clock tests short.
#[allow(dead_code)]
pub fn fast_config() -> RateLimiterConfig {
    RateLimiterConfig {
        max_requests_per_second: 20.0,
        max_burst_requests: 10,
        retry_delay_ms: 100,
        max_retries: 3,
        circuit_breaker_threshold: 5,
        batch_size: 10,
        priority_levels: 3,
    }
}

/// A processor over `catalog` with its own limiter.
#[allow(dead_code)]
pub fn processor_with(catalog: &Arc<FakeCatalog>, config: RateLimiterConfig) -> BulkJobProcessor {
    let limiter = RateLimiter::new(config).expect("valid limiter config");
    let search: Arc<dyn CatalogSearch> = catalog.clone();
    BulkJobProcessor::new(limiter, search, ProcessorConfig::default())
}

/// A 429 the limiter treats as throttling.
#[allow(dead_code)]
pub fn too_many_requests() -> OperationError {
    OperationError::with_status(429, "Too Many Requests")
}
