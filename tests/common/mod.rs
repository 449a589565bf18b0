//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::Semaphore;
use tower::ServiceExt;

use workgate::config::{AppConfig, ConfigStore};
use workgate::lifecycle::Application;
use workgate::worker::{EchoExecutor, Executors, JobContext, JobError, JobExecutor, JobFuture, WorkerState};

/// Small, fast configuration bound to an ephemeral port.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.address = "127.0.0.1:0".into();
    config.server.request_timeout_ms = 2_000;
    config.concurrency.max_concurrent_requests = 64;
    config.pools.primary.workers = 2;
    config.pools.primary.queue_capacity = 16;
    config.reload.enabled = false;
    config.scheduler.enabled = false;
    config.shutdown.grace_period_secs = 5;
    config
}

/// Build an application that is driven through its router only.
pub fn build_app(config: AppConfig, executors: Executors) -> Application {
    let store = Arc::new(ConfigStore::from_config(config));
    Application::build(store, executors, None).unwrap()
}

/// Build an application and serve it on 127.0.0.1 with a random port.
pub async fn start_app(config: AppConfig, executors: Executors) -> (Application, SocketAddr) {
    let app = build_app(config, executors);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = app.serve(listener).unwrap();
    (app, addr)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Drive one request through the router.
pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    TestResponse { status, headers, body }
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

pub fn post_json(path: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

pub fn echo(message: &str) -> Request<Body> {
    post_json("/api/v1/echo", serde_json::json!({ "message": message }).to_string())
}

/// Echoes after `delay`.
pub fn slow(delay: Duration) -> Arc<dyn JobExecutor> {
    Arc::new(EchoExecutor::new(delay))
}

/// Never completes.
pub fn stuck() -> Arc<dyn JobExecutor> {
    Arc::new(|_: &'static str, _: &JobContext, _: Value| -> JobFuture {
        Box::pin(futures_util::future::pending())
    })
}

/// Echoes once the test adds a permit to `gate`.
pub fn gated(gate: Arc<Semaphore>) -> Arc<dyn JobExecutor> {
    Arc::new(move |_: &'static str, _: &JobContext, input: Value| -> JobFuture {
        let gate = Arc::clone(&gate);
        Box::pin(async move {
            let permit = gate.acquire().await.map_err(|e| JobError::Failed(e.to_string()))?;
            permit.forget();
            Ok(input)
        })
    })
}

/// Panics inside the job.
pub fn panicking() -> Arc<dyn JobExecutor> {
    Arc::new(|_: &'static str, _: &JobContext, _: Value| -> JobFuture {
        Box::pin(async { panic!("job exploded") })
    })
}

pub fn with_primary(primary: Arc<dyn JobExecutor>) -> Executors {
    Executors {
        primary,
        ..Executors::default()
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

pub fn primary_executing(app: &Application) -> bool {
    app.state()
        .pools
        .states(workgate::worker::PoolKind::Primary)
        .contains(&WorkerState::Executing)
}

/// A fresh directory under the system temp dir.
pub fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("workgate-test-{}", uuid::Uuid::new_v4().simple()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write `content` and push the modification time forward so the change is
/// visible even within the filesystem's timestamp granularity.
pub fn write_config(path: &Path, content: &str, generation: u64) {
    std::fs::write(path, content).unwrap();
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(generation))
        .unwrap();
}
