//! Request-scoped values.
//!
//! # Responsibilities
//! - Generate the `X-Request-Id` header when the caller did not send one
//! - Carry the correlation id and the hot settings captured at request start
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Timeout and body limit are copied once per request; a reload while the
//!   request runs does not change them

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderValue, Request};
use tokio::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::config::schema::HotFields;
use crate::http::response::{ApiError, PipelineError};
use crate::observability::correlation::TxId;
use crate::worker::job::JobContext;

/// Generates `X-Request-Id` values in the same format as [`TxId`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeTxId;

impl MakeRequestId for MakeTxId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(TxId::generate().as_str())
            .ok()
            .map(RequestId::new)
    }
}

/// What a handler needs to know about the request it serves.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tx_id: TxId,
    /// Hot settings as they were when the request started.
    pub hot: HotFields,
    pub deadline: Instant,
}

impl RequestContext {
    pub fn new(tx_id: TxId, hot: HotFields, started: Instant) -> Self {
        Self {
            tx_id,
            hot,
            deadline: started + hot.request_timeout,
        }
    }

    /// Context handed to any job dispatched on behalf of this request.
    pub fn job_context(&self) -> JobContext {
        JobContext::new(self.tx_id.clone(), self.deadline)
    }

    pub fn fail(&self, error: impl Into<PipelineError>) -> ApiError {
        error.into().with_tx(self.tx_id.clone())
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<RequestContext>().cloned().ok_or_else(|| {
            let tx_id = parts.extensions.get::<TxId>().cloned().unwrap_or_else(TxId::generate);
            PipelineError::Internal("request context missing".into()).with_tx(tx_id)
        })
    }
}
