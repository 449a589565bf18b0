//! Access logging and request metrics.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::http::middleware::tx_id_of;
use crate::observability::metrics::PipelineMetrics;

pub async fn access_log(
    State(metrics): State<Arc<PipelineMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let tx_id = tx_id_of(&request);
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let response = next.run(request).await;

    let elapsed = started.elapsed();
    metrics.observe_request(elapsed);
    tracing::info!(
        tx_id = %tx_id,
        method = %method,
        path = %path,
        remote = ?remote,
        status = response.status().as_u16(),
        duration_ms = elapsed.as_millis() as u64,
        "Request completed"
    );
    response
}
