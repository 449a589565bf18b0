//! Response envelope and the client-facing error taxonomy.
//!
//! # Responsibilities
//! - Render every response as `{code, message, data, txId}`
//! - Map internal failures to a stable status, code and message
//! - Log internal detail with the correlation id; never return it
//!
//! # Design Decisions
//! - `data` is always present (`null` when there is nothing to return)
//! - Error messages are fixed strings per code

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::observability::correlation::TxId;
use crate::security::admission::AdmissionError;
use crate::worker::job::{JobDropped, JobError};
use crate::worker::pool::SubmitError;

/// Uniform response body.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub code: &'static str,
    pub message: &'static str,
    pub data: Option<T>,
    #[serde(rename = "txId")]
    pub tx_id: TxId,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(tx_id: TxId, message: &'static str, data: T) -> Self {
        Self {
            code: "OK",
            message,
            data: Some(data),
            tx_id,
        }
    }
}

impl Envelope<()> {
    /// An envelope with `data: null`.
    pub fn bare(tx_id: TxId, code: &'static str, message: &'static str) -> Self {
        Self {
            code,
            message,
            data: None,
            tx_id,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Every way a request can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("admission limit reached")]
    AdmissionRejected,
    #[error("shutting down")]
    ShuttingDown,
    #[error("{0} queue full")]
    Backpressure(String),
    #[error("request deadline exceeded")]
    DeadlineExceeded,
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("payload exceeds {0} bytes")]
    PayloadTooLarge(usize),
    #[error("request body not received within the read timeout")]
    BodyReadTimeout,
    #[error("job failed: {0}")]
    JobFailed(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::AdmissionRejected
            | PipelineError::ShuttingDown
            | PipelineError::Backpressure(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            PipelineError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            PipelineError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            PipelineError::BodyReadTimeout => StatusCode::REQUEST_TIMEOUT,
            PipelineError::JobFailed(_) | PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::AdmissionRejected => "CONCURRENCY_LIMIT_EXCEEDED",
            PipelineError::ShuttingDown => "SHUTTING_DOWN",
            PipelineError::Backpressure(_) => "BACKPRESSURE",
            PipelineError::DeadlineExceeded => "REQUEST_TIMEOUT",
            PipelineError::MalformedInput(_) => "BAD_REQUEST",
            PipelineError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            PipelineError::BodyReadTimeout => "REQUEST_TIMEOUT",
            PipelineError::JobFailed(_) | PipelineError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Client-visible message.
    pub fn message(&self) -> &'static str {
        match self {
            PipelineError::AdmissionRejected => "too many concurrent requests",
            PipelineError::ShuttingDown => "server shutting down",
            PipelineError::Backpressure(_) => "server busy",
            PipelineError::DeadlineExceeded | PipelineError::BodyReadTimeout => "request timeout",
            PipelineError::MalformedInput(_) => "invalid json",
            PipelineError::PayloadTooLarge(_) => "payload too large",
            PipelineError::JobFailed(_) | PipelineError::Internal(_) => "internal error",
        }
    }

    /// Attach the request's correlation id.
    pub fn with_tx(self, tx_id: TxId) -> ApiError {
        ApiError { error: self, tx_id }
    }
}

impl From<AdmissionError> for PipelineError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::Saturated => PipelineError::AdmissionRejected,
            AdmissionError::Closed => PipelineError::ShuttingDown,
        }
    }
}

impl From<SubmitError> for PipelineError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Saturated { pool } => PipelineError::Backpressure(pool.to_string()),
            SubmitError::Stopped { .. } => PipelineError::ShuttingDown,
        }
    }
}

impl From<JobError> for PipelineError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::DeadlineExceeded => PipelineError::DeadlineExceeded,
            other => PipelineError::JobFailed(other.to_string()),
        }
    }
}

impl From<JobDropped> for PipelineError {
    fn from(_: JobDropped) -> Self {
        PipelineError::ShuttingDown
    }
}

/// A [`PipelineError`] bound to the request it happened on.
#[derive(Debug)]
pub struct ApiError {
    pub error: PipelineError,
    pub tx_id: TxId,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(tx_id = %self.tx_id, code = self.error.code(), error = %self.error, "Request failed");
        } else {
            tracing::warn!(tx_id = %self.tx_id, code = self.error.code(), error = %self.error, "Request rejected");
        }
        let body = Envelope::<()> {
            code: self.error.code(),
            message: self.error.message(),
            data: None,
            tx_id: self.tx_id,
        };
        (status, Json(body)).into_response()
    }
}
