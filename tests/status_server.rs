//! Status server endpoints over a real socket.

mod helpers;

use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::TcpListener;

use bulk_lookup::{serve_status, BulkJobProcessor, StatusState};
use helpers::{fast_config, processor_with, FakeCatalog};

async fn spawn_server(processor: BulkJobProcessor) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve_status(listener, StatusState::new(processor)));
    format!("http://{}", addr)
}

async fn poll_until_finished(client: &reqwest::Client, url: &str) -> Value {
    for _ in 0..200 {
        let job: Value = client.get(url).send().await.unwrap().json().await.unwrap();
        if job["status"] == "completed" || job["status"] == "failed" {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job at {} did not finish", url);
}

#[tokio::test]
async fn test_submit_and_poll_job() {
    let catalog = FakeCatalog::new();
    let base = spawn_server(processor_with(&catalog, fast_config())).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/jobs", base))
        .json(&json!({
            "filename": "api.json",
            "rows": [
                {"upc": "111"},
                {"mpn": "M-2", "brand": "Acme"},
                {"notes": "nothing to search"}
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);
    let summary: Value = response.json().await.unwrap();
    assert_eq!(summary["status"], "queued");
    assert_eq!(summary["total_rows"], 3);
    let id = summary["id"].as_str().unwrap().to_string();

    let job = poll_until_finished(&client, &format!("{}/jobs/{}", base, id)).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["skipped_rows"], 1);
    assert_eq!(job["results"].as_array().unwrap().len(), 2);
    assert_eq!(job["results"][1]["search_method"], "secondary-identifier");

    let jobs: Value = client
        .get(format!("{}/jobs", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(jobs.as_array().unwrap().len(), 1);
    assert!(jobs[0].get("results").is_none(), "listing omits results");

    let stats: Value = client
        .get(format!("{}/stats", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["outcomes"]["success"], 2);
    assert_eq!(stats["total_failures"], 0);
}

#[tokio::test]
async fn test_control_endpoints() {
    let catalog = FakeCatalog::new();
    let processor = processor_with(&catalog, fast_config());
    let job = processor.submit(vec![helpers::row(&[("upc", "222")])], "done.json");
    processor.wait_for_job(&job.id).await.unwrap();
    let base = spawn_server(processor).await;
    let client = reqwest::Client::new();

    let missing = client
        .post(format!("{}/jobs/job_missing/pause", base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    let conflict = client
        .post(format!("{}/jobs/{}/resume", base, job.id))
        .send()
        .await
        .unwrap();
    assert_eq!(conflict.status(), 409);
    let body: Value = conflict.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("cannot be resumed while completed"));

    let not_found = client
        .get(format!("{}/jobs/job_missing", base))
        .send()
        .await
        .unwrap();
    assert_eq!(not_found.status(), 404);
}

#[tokio::test]
async fn test_cancel_endpoint() {
    let catalog = FakeCatalog::with_latency(Duration::from_millis(200));
    let processor = processor_with(&catalog, fast_config());
    let job = processor.submit(helpers::upc_rows("300", 20), "slow.json");
    let base = spawn_server(processor).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/jobs/{}/cancel", base, job.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["job_id"], job.id);
    assert_eq!(body["status"], "failed");

    let job: Value = client
        .get(format!("{}/jobs/{}", base, job.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(job["error"], "Job cancelled");
}

#[tokio::test]
async fn test_rate_limiter_and_metrics_endpoints() {
    let catalog = FakeCatalog::new();
    let base = spawn_server(processor_with(&catalog, fast_config())).await;
    let client = reqwest::Client::new();

    let status: Value = client
        .get(format!("{}/rate-limiter", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["queue_length"], 0);
    assert_eq!(status["active_requests"], 0);
    assert_eq!(status["current_tokens"], 10);
    assert_eq!(status["circuit_breaker_open"], false);

    let metrics = client
        .get(format!("{}/metrics", base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("bulk_lookup_queue_length 0"));
    assert!(metrics.contains("bulk_lookup_circuit_breaker_open 0"));
    assert!(metrics.contains(r#"bulk_lookup_requests_total{outcome="success"} 0"#));
}
