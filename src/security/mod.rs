//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → admission.rs (take a concurrency slot or reject with 503)
//!     → deadline + handler
//!     → slot released when the response is produced
//! ```
//!
//! # Design Decisions
//! - Fail fast: excess load is rejected, never queued
//! - Body size limits are enforced where the body is read (see `http::handlers`)

pub mod admission;

pub use admission::{AdmissionError, AdmissionGate, AdmissionPermit};
