//! Request pipeline middleware.
//!
//! # Data Flow (outermost first)
//! ```text
//! correlation.rs  → TxId from X-Request-Id, echoed on the response
//! recovery.rs     → panic anywhere below becomes a 500 envelope
//! access_log.rs   → one log line and duration metrics per request
//! admission.rs    → take a concurrency slot or reject
//! deadline.rs     → capture hot settings, race the handler against the deadline
//! ```

pub mod access_log;
pub mod admission;
pub mod correlation;
pub mod deadline;
pub mod recovery;

pub use access_log::access_log;
pub use admission::admit;
pub use correlation::assign_tx_id;
pub use deadline::enforce_deadline;
pub use recovery::recover_panics;

use axum::extract::Request;

use crate::observability::correlation::TxId;

/// The request's correlation id, or a fresh one if none was assigned.
pub(crate) fn tx_id_of(request: &Request) -> TxId {
    request
        .extensions()
        .get::<TxId>()
        .cloned()
        .unwrap_or_else(TxId::generate)
}
