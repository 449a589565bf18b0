//! Route handlers.

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::{Deserialize, Serialize};
use tower_http::timeout::TimeoutError;

use crate::http::request::RequestContext;
use crate::http::response::{ApiError, Envelope, PipelineError};
use crate::http::server::AppState;
use crate::worker::job::PoolKind;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Liveness only; no dependency checks.
pub async fn healthz(ctx: RequestContext) -> Envelope<()> {
    Envelope::bare(ctx.tx_id, "OK", "alive")
}

/// Always ready; dependency checks belong to the embedding service.
pub async fn readyz(ctx: RequestContext) -> Envelope<()> {
    Envelope::bare(ctx.tx_id, "READY", "ready")
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], state.metrics.render())
}

#[derive(Debug, Serialize)]
pub struct Pong {
    pub now: DateTime<Utc>,
}

pub async fn ping(ctx: RequestContext) -> Envelope<Pong> {
    Envelope::ok(ctx.tx_id, "pong", Pong { now: Utc::now() })
}

/// A missing `message` echoes as empty.
#[derive(Debug, Serialize, Deserialize)]
pub struct EchoRequest {
    #[serde(default)]
    pub message: String,
}

/// Echo the body back through the primary pool.
pub async fn echo(
    State(state): State<AppState>,
    ctx: RequestContext,
    request: Request,
) -> Result<Envelope<serde_json::Value>, ApiError> {
    let body = read_body(request.into_body(), ctx.hot.max_body_bytes)
        .await
        .map_err(|e| ctx.fail(e))?;
    let payload: EchoRequest =
        serde_json::from_slice(&body).map_err(|e| ctx.fail(PipelineError::MalformedInput(e.to_string())))?;
    let input = serde_json::to_value(&payload).map_err(|e| ctx.fail(PipelineError::Internal(e.to_string())))?;

    let ticket = state
        .pools
        .dispatch(PoolKind::Primary, "echo", ctx.job_context(), input)
        .map_err(|e| ctx.fail(e))?;
    let data = ticket
        .outcome()
        .await
        .map_err(|e| ctx.fail(e))?
        .map_err(|e| ctx.fail(e))?;

    Ok(Envelope::ok(ctx.tx_id, "echo", data))
}

/// Read at most `limit` bytes of body.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, PipelineError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => Err(PipelineError::PayloadTooLarge(limit)),
        Err(err) if timed_out(&*err) => Err(PipelineError::BodyReadTimeout),
        Err(err) => Err(PipelineError::MalformedInput(format!("body read failed: {err}"))),
    }
}

/// The body timeout error arrives wrapped, so walk the source chain.
fn timed_out(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.is::<TimeoutError>() {
            return true;
        }
        current = err.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tower_http::timeout::TimeoutBody;

    #[tokio::test]
    async fn body_within_limit_is_read() {
        let bytes = read_body(Body::from("12345"), 5).await.unwrap();
        assert_eq!(&bytes[..], b"12345");
    }

    #[tokio::test]
    async fn body_over_limit_is_too_large() {
        let err = read_body(Body::from("123456"), 5).await.unwrap_err();
        assert_eq!(err, PipelineError::PayloadTooLarge(5));
    }

    #[tokio::test]
    async fn stalled_body_is_a_read_timeout() {
        let stalled = Body::from_stream(futures_util::stream::pending::<Result<Bytes, std::io::Error>>());
        let body = Body::new(TimeoutBody::new(Duration::from_millis(20), stalled));

        let err = read_body(body, 1024).await.unwrap_err();
        assert_eq!(err, PipelineError::BodyReadTimeout);
        assert_eq!(err.status(), axum::http::StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn broken_body_is_malformed() {
        let broken = Body::from_stream(futures_util::stream::once(async {
            Err::<Bytes, _>(std::io::Error::other("reset"))
        }));
        let err = read_body(broken, 1024).await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput(_)), "{err:?}");
    }
}
