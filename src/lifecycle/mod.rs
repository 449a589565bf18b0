//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Initialize subsystems → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Close admission → Stop workers/tasks → Drain → Report
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listener
//! - Ordered shutdown: stop admitting, drain, tear down
//! - Shutdown has a single grace period; whatever is left is aborted

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{DrainOutcome, DrainReport, Shutdown, ShutdownCoordinator, ShutdownSignal};
pub use startup::{Application, StartupError};
