//! Admission middleware.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::middleware::tx_id_of;
use crate::http::response::PipelineError;
use crate::security::admission::AdmissionGate;

/// Hold a gate slot for the rest of the pipeline, or reject at once.
pub async fn admit(State(gate): State<AdmissionGate>, request: Request, next: Next) -> Response {
    match gate.try_admit() {
        Ok(_permit) => next.run(request).await,
        Err(err) => PipelineError::from(err).with_tx(tx_id_of(&request)).into_response(),
    }
}
