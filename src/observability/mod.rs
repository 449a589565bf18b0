//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!     → correlation.rs (TxId carried on every request-scoped event)
//!
//! Consumers:
//!     → Log sinks (stdout, optional file)
//!     → Metrics endpoint (GET /metrics)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all subsystems as an explicit value
//! - Metrics are cheap (atomic increments) and live in one registry object

pub mod correlation;
pub mod logging;
pub mod metrics;
