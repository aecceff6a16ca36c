//! HTTP catalog client against a mock server.
//!
//! These tests use `httptest`; no real network requests are made.

use std::sync::Arc;

use httptest::{matchers::*, responders::*, Expectation, Server};

use bulk_lookup::{
    is_rate_limit_error, BulkJobProcessor, CatalogSearch, HttpCatalogSearch, JobStatus,
    RateLimiter, RateLimiterConfig, Row, SearchMethod,
};

const MATCHES: &str = r#"[
    {"external_id": "cat-1", "title": "Cordless Drill", "brand": "Acme", "price": 89.5, "rank": 1},
    {"external_id": "cat-2", "title": "Drill Bits"}
]"#;

fn search_for(server: &Server) -> HttpCatalogSearch {
    HttpCatalogSearch::new(reqwest::Client::new(), &format!("http://{}/api", server.addr())).unwrap()
}

#[tokio::test]
async fn test_search_by_upc_parses_matches() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/api/search/upc/012345678905"))
            .respond_with(status_code(200).body(MATCHES)),
    );

    let matches = search_for(&server)
        .search_by_upc("012345678905")
        .await
        .unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].external_id, "cat-1");
    assert_eq!(matches[0].brand.as_deref(), Some("Acme"));
    assert_eq!(matches[0].price, Some(89.5));
    assert_eq!(matches[1].brand, None);
}

#[tokio::test]
async fn test_search_by_text_sends_query() {
    let server = Server::run();
    server.expect(
        Expectation::matching(httptest::all_of![
            request::method_path("GET", "/api/search"),
            request::query(url_decoded(contains(("q", "Acme cordless drill")))),
        ])
        .respond_with(status_code(200).body("[]")),
    );

    let matches = search_for(&server)
        .search_by_text("Acme cordless drill")
        .await
        .unwrap();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn test_throttled_response_is_rate_limit_error() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/api/search/mpn/AB-12"))
            .respond_with(status_code(429).body("Too many requests, slow down")),
    );

    let err = search_for(&server).search_by_mpn("AB-12").await.unwrap_err();
    assert_eq!(err.status, Some(429));
    assert!(err.message.contains("slow down"));
    assert!(is_rate_limit_error(&err));
}

#[tokio::test]
async fn test_server_error_without_body_uses_reason() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/api/search/upc/1"))
            .respond_with(status_code(500)),
    );

    let err = search_for(&server).search_by_upc("1").await.unwrap_err();
    assert_eq!(err.status, Some(500));
    assert_eq!(err.message, "Internal Server Error");
    assert!(!is_rate_limit_error(&err));
}

#[tokio::test]
async fn test_malformed_body_is_an_error() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/api/search/upc/2"))
            .respond_with(status_code(200).body("<html>maintenance</html>")),
    );

    let err = search_for(&server).search_by_upc("2").await.unwrap_err();
    assert_eq!(err.status, None);
    assert!(err.message.starts_with("Invalid search response"));
}

#[tokio::test]
async fn test_job_falls_back_from_upc_to_mpn_over_http() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/api/search/upc/0999"))
            .respond_with(status_code(404).body("unknown upc")),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/api/search/mpn/DR-100"))
            .respond_with(status_code(200).body(MATCHES)),
    );

    let limiter = RateLimiter::new(RateLimiterConfig {
        max_requests_per_second: 20.0,
        max_burst_requests: 5,
        ..Default::default()
    })
    .unwrap();
    let processor = BulkJobProcessor::new(limiter, Arc::new(search_for(&server)), Default::default());

    let row: Row = [
        ("UPC".to_string(), "0999".to_string()),
        ("Part Number".to_string(), "DR-100".to_string()),
    ]
    .into();
    let job = processor.submit(vec![row], "http.json");
    let job = processor.wait_for_job(&job.id).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    let result = &job.results[0];
    assert_eq!(result.search_method, SearchMethod::ExactIdentifier);
    assert!(result.success);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.found_matches.len(), 2);
    assert_eq!(result.search_criteria.mpn.as_deref(), Some("DR-100"));
}
