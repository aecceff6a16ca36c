//! End-to-end runs of the library entry point.

use std::io::Write;

use clap::Parser;
use httptest::{matchers::*, responders::*, Expectation, Server};
use tempfile::{NamedTempFile, TempDir};

use bulk_lookup::{run_bulk_lookup, JobStatus, Opt};

fn opt(args: &[&str]) -> Opt {
    let mut argv = vec!["bulk_lookup"];
    argv.extend_from_slice(args);
    Opt::parse_from(argv)
}

#[tokio::test]
async fn test_run_writes_results_file() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/search/upc/12345"))
            .respond_with(status_code(200).body(r#"[{"external_id": "c-1", "title": "Widget"}]"#)),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/search/mpn/NOPE-1"))
            .respond_with(status_code(404).body("no such part")),
    );

    let mut input = NamedTempFile::new().unwrap();
    write!(
        input,
        r#"[{{"upc": 12345}}, {{"mpn": "NOPE-1"}}, {{"comment": "skip me"}}]"#
    )
    .unwrap();
    let out_dir = TempDir::new().unwrap();
    let output = out_dir.path().join("job.json");
    let base_url = format!("http://{}/", server.addr());

    let report = run_bulk_lookup(opt(&[
        input.path().to_str().unwrap(),
        "--api-base-url",
        &base_url,
        "--rate-limit-rps",
        "20",
        "--output",
        output.to_str().unwrap(),
    ]))
    .await
    .unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.total_rows, 3);
    assert_eq!(report.successful, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.output.as_deref(), Some(output.as_path()));

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["status"], "completed");
    assert_eq!(written["results"][0]["found_matches"][0]["external_id"], "c-1");
    assert_eq!(written["results"][1]["success"], false);
    assert!(written["results"][1]["error"]
        .as_str()
        .unwrap()
        .contains("HTTP 404"));
}

#[tokio::test]
async fn test_run_fails_on_missing_input() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("rows.json");
    let err = run_bulk_lookup(opt(&[
        missing.to_str().unwrap(),
        "--api-base-url",
        "http://127.0.0.1:9/",
    ]))
    .await
    .unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to read input file"));
}

#[tokio::test]
async fn test_run_rejects_invalid_limiter_settings() {
    let mut input = NamedTempFile::new().unwrap();
    write!(input, "[]").unwrap();
    let err = run_bulk_lookup(opt(&[
        input.path().to_str().unwrap(),
        "--api-base-url",
        "http://127.0.0.1:9/",
        "--batch-size",
        "0",
    ]))
    .await
    .unwrap_err();
    assert!(format!("{:#}", err).contains("batch_size must be at least 1"));
}
