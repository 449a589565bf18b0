//! Correlation id assignment.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

use crate::observability::correlation::{TxId, X_REQUEST_ID};

/// Take the id from `X-Request-Id` (or generate one), store it on the request
/// and make sure the response carries the same value.
pub async fn assign_tx_id(mut request: Request, next: Next) -> Response {
    let tx_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(TxId::from_upstream)
        .unwrap_or_else(TxId::generate);
    request.extensions_mut().insert(tx_id.clone());

    let span = tracing::info_span!("request", tx_id = %tx_id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(tx_id.as_str()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
