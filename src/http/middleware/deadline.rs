//! Per-request deadline.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::time::Instant;

use crate::config::schema::TimeoutPolicy;
use crate::http::middleware::tx_id_of;
use crate::http::request::RequestContext;
use crate::http::response::PipelineError;
use crate::http::server::AppState;
use crate::resilience::timeouts::{with_deadline, with_deadline_detached};

/// Capture the hot settings for this request and bound the handler by the
/// captured timeout.
pub async fn enforce_deadline(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let hot = state.config.hot();
    let ctx = RequestContext::new(tx_id_of(&request), hot, Instant::now());
    let tx_id = ctx.tx_id.clone();
    request.extensions_mut().insert(ctx);

    let outcome = match state.timeout_policy {
        TimeoutPolicy::Cancel => with_deadline(hot.request_timeout, next.run(request)).await,
        TimeoutPolicy::Detach => with_deadline_detached(hot.request_timeout, next.run(request)).await,
    };

    match outcome {
        Ok(response) => response,
        Err(exceeded) => {
            state.metrics.deadline_exceeded();
            tracing::debug!(tx_id = %tx_id, error = %exceeded, "Deadline fired before handler finished");
            PipelineError::DeadlineExceeded.with_tx(tx_id).into_response()
        }
    }
}
