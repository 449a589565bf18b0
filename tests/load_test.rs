//! Load testing for the pipeline.

use std::time::{Duration, Instant};

use workgate::worker::Executors;

mod common;

#[tokio::test]
async fn test_load_performance() {
    let mut config = common::test_config();
    config.pools.primary.workers = 8;
    config.pools.primary.queue_capacity = 1024;
    config.concurrency.max_concurrent_requests = 1024;
    let (app, addr) = common::start_app(config, Executors::default()).await;

    let concurrency = 20;
    let requests_per_task = 25;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::new();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for t in 0..concurrency {
        let client = client.clone();
        let url = format!("http://{}/api/v1/echo", addr);
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            let mut failures = 0;
            for i in 0..requests_per_task {
                let req_start = Instant::now();
                let res = client
                    .post(&url)
                    .json(&serde_json::json!({ "message": format!("{t}-{i}") }))
                    .send()
                    .await;
                match res {
                    Ok(res) if res.status().is_success() => latencies.push(req_start.elapsed()),
                    _ => failures += 1,
                }
            }
            (latencies, failures)
        }));
    }

    let mut all_latencies = Vec::new();
    let mut failures = 0;
    for task in tasks {
        let (latencies, failed) = task.await.unwrap();
        all_latencies.extend(latencies);
        failures += failed;
    }
    let total_duration = start.elapsed();

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[all_latencies.len() * 99 / 100];

    println!("--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Failures: {}", failures);
    println!("Total Duration: {:?}", total_duration);
    println!("Throughput: {:.2} req/s", total_requests as f64 / total_duration.as_secs_f64());
    println!("P50 Latency: {:?}", p50);
    println!("P99 Latency: {:?}", p99);

    assert_eq!(failures, 0);
    assert!(p99 < Duration::from_secs(2));

    let snapshot = app.state().metrics.snapshot();
    assert_eq!(snapshot.total, total_requests as u64);
    assert_eq!(snapshot.rejected, 0);

    let report = app.shutdown().await;
    assert_eq!(report.aborted_workers, 0);
}
