//! Background worker subsystem.
//!
//! # Data Flow
//! ```text
//! handler
//!     → Job::new (job + ticket)
//!     → WorkerPools::submit (bounded queue, non-blocking)
//!         full → SubmitError::Saturated (BACKPRESSURE)
//!     → worker dequeues, runs the pool's JobExecutor
//!     → result sent once on the job's reply slot
//!     → handler awaits the ticket under the request deadline
//! ```
//!
//! # Design Decisions
//! - Three independent pools; a full queue in one never blocks another
//! - Submission never waits for queue space
//! - Workers skip jobs whose caller is gone or whose deadline has passed
//! - A panicking job is reported as a failure; its worker keeps running

pub mod executor;
pub mod job;
pub mod pool;
pub mod pools;

pub use executor::{EchoExecutor, Executors, JobExecutor, JobFuture};
pub use job::{Job, JobContext, JobDropped, JobError, JobResult, JobTicket, PoolKind};
pub use pool::{JoinOutcome, SubmitError, WorkerPool, WorkerState};
pub use pools::WorkerPools;
