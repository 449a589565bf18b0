//! Panic recovery.

use std::panic::AssertUnwindSafe;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;

use crate::http::middleware::tx_id_of;
use crate::http::response::PipelineError;
use crate::resilience::panics::panic_message;

/// Turn a panic in any inner layer or handler into a 500 envelope.
///
/// Unwinding drops everything the request owned below this layer, including
/// its admission permit.
pub async fn recover_panics(request: Request, next: Next) -> Response {
    let tx_id = tx_id_of(&request);
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let detail = format!("panic: {}", panic_message(&*payload));
            PipelineError::Internal(detail).with_tx(tx_id).into_response()
        }
    }
}
