//! Correlation identifiers.
//!
//! A `TxId` is generated per inbound request unless the caller supplied one in
//! the `X-Request-Id` header. It is passed explicitly to every component that
//! logs on behalf of the request (middleware, handlers, jobs, workers) and is
//! echoed back in the response envelope and header. It carries no ownership.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

/// Name of the header that carries the correlation id in both directions.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Opaque per-request correlation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TxId(Arc<str>);

impl TxId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string().into())
    }

    /// Wrap an identifier supplied by an upstream caller.
    ///
    /// Blank values are replaced by a generated id.
    pub fn from_upstream(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Self::generate()
        } else {
            Self(trimmed.into())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
