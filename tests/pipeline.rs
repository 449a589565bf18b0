//! Request pipeline behaviour, driven through the router.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::routing::get as get_route;
use serde_json::json;
use tokio::sync::Semaphore;

use workgate::http::{apply_pipeline, routes, BodyTimeouts};
use workgate::worker::{Executors, PoolKind};

mod common;

use common::*;

#[tokio::test]
async fn ping_returns_envelope_with_tx_id() {
    let app = build_app(test_config(), Executors::default());
    let res = send(&app.router(), get("/api/v1/ping")).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["code"], "OK");
    assert_eq!(res.body["message"], "pong");
    assert!(res.body["data"]["now"].is_string());

    let tx_id = res.body["txId"].as_str().unwrap();
    assert_eq!(tx_id.len(), 32);
    assert_eq!(res.headers["x-request-id"], tx_id);
}

#[tokio::test]
async fn upstream_request_id_is_echoed() {
    let app = build_app(test_config(), Executors::default());
    let mut request = get("/api/v1/ping");
    request
        .headers_mut()
        .insert("x-request-id", "caller-supplied-42".parse().unwrap());
    let res = send(&app.router(), request).await;

    assert_eq!(res.body["txId"], "caller-supplied-42");
    assert_eq!(res.headers["x-request-id"], "caller-supplied-42");
}

#[tokio::test]
async fn health_endpoints_use_the_envelope() {
    let app = build_app(test_config(), Executors::default());
    let router = app.router();

    let health = send(&router, get("/healthz")).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["code"], "OK");
    assert_eq!(health.body["message"], "alive");
    assert!(health.body["data"].is_null());

    let ready = send(&router, get("/readyz")).await;
    assert_eq!(ready.status, StatusCode::OK);
    assert_eq!(ready.body["code"], "READY");
    assert!(ready.body["txId"].is_string());
}

#[tokio::test]
async fn echo_round_trips_any_message() {
    let app = build_app(test_config(), Executors::default());
    let router = app.router();

    for message in ["x", "", "héllo wörld 世界 🚀"] {
        let res = send(&router, echo(message)).await;
        assert_eq!(res.status, StatusCode::OK, "{message:?}");
        assert_eq!(res.body["code"], "OK");
        assert_eq!(res.body["message"], "echo");
        assert_eq!(res.body["data"], json!({ "message": message }));
    }
}

#[tokio::test]
async fn echo_without_message_echoes_empty() {
    let app = build_app(test_config(), Executors::default());
    let router = app.router();

    for body in ["{}", "{\"other\": true}"] {
        let res = send(&router, post_json("/api/v1/echo", body)).await;
        assert_eq!(res.status, StatusCode::OK, "{body}");
        assert_eq!(res.body["data"], json!({ "message": "" }));
    }
}

#[tokio::test]
async fn malformed_echo_is_bad_request() {
    let app = build_app(test_config(), Executors::default());
    let router = app.router();

    for body in ["{not json", "\"just text\"", "{\"message\": 5}"] {
        let res = send(&router, post_json("/api/v1/echo", body)).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(res.body["code"], "BAD_REQUEST");
        assert!(res.body["data"].is_null());
        assert!(res.body["txId"].is_string());
    }
}

#[tokio::test]
async fn oversized_echo_is_rejected() {
    let mut config = test_config();
    config.server.max_body_bytes = 64;
    let app = build_app(config, Executors::default());

    let big = "a".repeat(200);
    let res = send(&app.router(), echo(&big)).await;
    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(res.body["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn slow_handler_hits_the_deadline() {
    let mut config = test_config();
    config.server.request_timeout_ms = 50;
    let app = build_app(config, with_primary(slow(Duration::from_millis(500))));

    let started = Instant::now();
    let res = send(&app.router(), echo("late")).await;
    let elapsed = started.elapsed();

    assert_eq!(res.status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(res.body["code"], "REQUEST_TIMEOUT");
    assert!(elapsed < Duration::from_millis(400), "took {elapsed:?}");
    assert_eq!(app.state().metrics.snapshot().deadline_exceeded, 1);
}

#[tokio::test]
async fn detached_policy_also_answers_at_the_deadline() {
    let mut config = test_config();
    config.server.request_timeout_ms = 50;
    config.server.timeout_policy = workgate::config::TimeoutPolicy::Detach;
    let app = build_app(config, with_primary(slow(Duration::from_millis(500))));

    let started = Instant::now();
    let res = send(&app.router(), echo("late")).await;
    assert_eq!(res.status, StatusCode::GATEWAY_TIMEOUT);
    assert!(started.elapsed() < Duration::from_millis(400));
}

#[tokio::test]
async fn fast_handler_beats_the_deadline() {
    let mut config = test_config();
    config.server.request_timeout_ms = 500;
    let app = build_app(config, with_primary(slow(Duration::from_millis(20))));

    let res = send(&app.router(), echo("on time")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["message"], "on time");
}

#[tokio::test]
async fn admission_limit_rejects_the_extra_request() {
    let mut config = test_config();
    config.concurrency.max_concurrent_requests = 2;
    let gate = Arc::new(Semaphore::new(0));
    let app = build_app(config, with_primary(gated(Arc::clone(&gate))));
    let router = app.router();

    let held: Vec<_> = (0..2)
        .map(|i| {
            let router = router.clone();
            tokio::spawn(async move { send(&router, echo(&format!("held-{i}"))).await })
        })
        .collect();
    wait_for(|| app.state().gate.in_flight() == 2).await;

    let rejected = send(&router, get("/api/v1/ping")).await;
    assert_eq!(rejected.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(rejected.body["code"], "CONCURRENCY_LIMIT_EXCEEDED");
    assert_eq!(app.state().metrics.snapshot().rejected, 1);

    gate.add_permits(2);
    for handle in held {
        assert_eq!(handle.await.unwrap().status, StatusCode::OK);
    }
    wait_for(|| app.state().gate.in_flight() == 0).await;

    let admitted = send(&router, get("/api/v1/ping")).await;
    assert_eq!(admitted.status, StatusCode::OK);
}

#[tokio::test]
async fn full_queue_is_backpressure_not_admission() {
    let mut config = test_config();
    config.pools.primary.workers = 1;
    config.pools.primary.queue_capacity = 1;
    let gate = Arc::new(Semaphore::new(0));
    let app = build_app(config, with_primary(gated(Arc::clone(&gate))));
    let router = app.router();

    let running = {
        let router = router.clone();
        tokio::spawn(async move { send(&router, echo("running")).await })
    };
    wait_for(|| primary_executing(&app)).await;

    let queued = {
        let router = router.clone();
        tokio::spawn(async move { send(&router, echo("queued")).await })
    };
    wait_for(|| app.state().pools.get(PoolKind::Primary).queue_len() == 1).await;

    let rejected = send(&router, echo("overflow")).await;
    assert_eq!(rejected.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(rejected.body["code"], "BACKPRESSURE");

    gate.add_permits(2);
    assert_eq!(running.await.unwrap().body["data"]["message"], "running");
    assert_eq!(queued.await.unwrap().body["data"]["message"], "queued");
}

async fn explode() -> &'static str {
    panic!("handler exploded")
}

#[tokio::test]
async fn handler_panic_is_recovered() {
    let app = build_app(test_config(), Executors::default());
    let state = app.state().clone();
    let router = apply_pipeline(
        routes().route("/boom", get_route(explode)),
        state,
        BodyTimeouts {
            read: Duration::from_secs(5),
            write: Duration::from_secs(5),
        },
    );

    let res = send(&router, get("/boom")).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["code"], "INTERNAL_ERROR");
    assert_eq!(res.body["message"], "internal error");
    assert_eq!(res.body["txId"].as_str().unwrap().len(), 32);
    assert_eq!(app.state().gate.in_flight(), 0);

    let after = send(&router, get("/api/v1/ping")).await;
    assert_eq!(after.status, StatusCode::OK);
}

#[tokio::test]
async fn job_panic_is_an_internal_error() {
    let app = build_app(test_config(), with_primary(panicking()));
    let router = app.router();

    let res = send(&router, echo("boom")).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["code"], "INTERNAL_ERROR");

    let again = send(&router, echo("boom")).await;
    assert_eq!(again.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(send(&router, get("/healthz")).await.status, StatusCode::OK);
}

#[tokio::test]
async fn metrics_endpoint_exposes_pipeline_series() {
    let app = build_app(test_config(), Executors::default());
    let router = app.router();
    send(&router, get("/api/v1/ping")).await;

    let response = {
        use tower::ServiceExt;
        router.clone().oneshot(get("/metrics")).await.unwrap()
    };
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"), "{content_type}");

    let bytes = {
        use http_body_util::BodyExt;
        response.into_body().collect().await.unwrap().to_bytes()
    };
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    for series in [
        "workgate_concurrent_requests",
        "workgate_rejected_requests",
        "workgate_request_avg_duration_millis",
        "workgate_total_requests",
    ] {
        assert!(text.contains(series), "missing {series}:\n{text}");
    }
    assert!(app.state().metrics.snapshot().total >= 1);
}

#[tokio::test]
async fn idle_keep_alive_connection_is_closed() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut config = test_config();
    config.server.idle_timeout_secs = 1;
    let (app, addr) = start_app(config, Executors::default()).await;

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await.unwrap();
    assert!(String::from_utf8_lossy(&buf[..n]).starts_with("HTTP/1.1 200"));

    let started = Instant::now();
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "idle connection was kept open");
    assert!(started.elapsed() >= Duration::from_millis(500), "closed after {:?}", started.elapsed());

    app.shutdown().await;
}
