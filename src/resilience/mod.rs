//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted request:
//!     → timeouts.rs (race the handler against the request deadline)
//!     → panics.rs (turn a caught panic into a loggable message)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every request has a deadline
//! - A timed-out request returns 504, a panic returns 500; neither takes the
//!   process down

pub mod panics;
pub mod timeouts;

pub use timeouts::{with_deadline, with_deadline_detached, DeadlineExceeded};
