//! Rate limiter and job processor wiring.

use std::sync::Arc;

use crate::config::{Opt, ProcessorConfig, RateLimiterConfig, HTTP_REQUEST_TIMEOUT};
use crate::error_handling::InitializationError;
use crate::jobs::BulkJobProcessor;
use crate::rate_limiter::RateLimiter;
use crate::search::HttpCatalogSearch;

use super::client::init_client;

/// Builds the HTTP search client, the rate limiter and the job processor
/// from command-line options.
///
/// Must be called from within a Tokio runtime (both components spawn
/// background tasks).
///
/// # Errors
///
/// Returns `InitializationError` if the HTTP client cannot be built, the base
/// URL is invalid, or the limiter settings are rejected.
pub fn init_processor(opt: &Opt) -> Result<BulkJobProcessor, InitializationError> {
    let client = init_client(HTTP_REQUEST_TIMEOUT)?;
    let search = HttpCatalogSearch::new(client, &opt.api_base_url)?;
    log::info!("Catalog API: {}", search.base_url());

    let limiter = RateLimiter::new(RateLimiterConfig::from(opt))?;
    Ok(BulkJobProcessor::new(
        limiter,
        Arc::new(search),
        ProcessorConfig::default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn opt(args: &[&str]) -> Opt {
        let mut argv = vec!["bulk_lookup", "rows.json"];
        argv.extend_from_slice(args);
        Opt::parse_from(argv)
    }

    #[tokio::test]
    async fn test_init_processor_from_options() {
        let processor = init_processor(&opt(&[
            "--api-base-url",
            "http://127.0.0.1:9/api",
            "--rate-burst",
            "3",
        ]))
        .unwrap();
        let status = processor.get_rate_limiter_status();
        assert_eq!(status.current_tokens, 3);
        assert!(!status.circuit_breaker_open);
        processor.shutdown();
        processor.rate_limiter().shutdown();
    }

    #[tokio::test]
    async fn test_init_processor_rejects_bad_url() {
        let result = init_processor(&opt(&["--api-base-url", "not a url"]));
        assert!(matches!(result, Err(InitializationError::BaseUrlError(_))));
    }

    #[tokio::test]
    async fn test_init_processor_rejects_zero_rate() {
        let result = init_processor(&opt(&[
            "--api-base-url",
            "http://127.0.0.1:9/",
            "--rate-limit-rps",
            "0",
        ]));
        assert!(matches!(result, Err(InitializationError::ConfigError(_))));
    }
}
