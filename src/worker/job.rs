//! Jobs and their single-use result slots.

use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::observability::correlation::TxId;

/// The three independent pools a job can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// Primary request logic.
    Primary,
    /// Database / storage access.
    DataAccess,
    /// Calls to external systems.
    External,
}

impl PoolKind {
    pub const ALL: [PoolKind; 3] = [PoolKind::Primary, PoolKind::DataAccess, PoolKind::External];

    pub fn as_str(&self) -> &'static str {
        match self {
            PoolKind::Primary => "primary",
            PoolKind::DataAccess => "data_access",
            PoolKind::External => "external",
        }
    }

    /// Position in [`PoolKind::ALL`].
    pub fn index(&self) -> usize {
        match self {
            PoolKind::Primary => 0,
            PoolKind::DataAccess => 1,
            PoolKind::External => 2,
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-scoped data a job carries into its worker.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub tx_id: TxId,
    /// The submitting request's deadline, captured at admission.
    pub deadline: Instant,
}

impl JobContext {
    pub fn new(tx_id: TxId, deadline: Instant) -> Self {
        Self { tx_id, deadline }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Why a job produced no output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// The job's own logic reported a failure.
    #[error("job failed: {0}")]
    Failed(String),
    /// The job panicked; the worker survived.
    #[error("job panicked: {0}")]
    Panicked(String),
    /// The job's deadline passed before or while it ran.
    #[error("job deadline exceeded")]
    DeadlineExceeded,
}

/// Terminal outcome of a job.
pub type JobResult = Result<Value, JobError>;

/// A unit of work bound for one pool.
pub struct Job {
    pub(crate) pool: PoolKind,
    pub(crate) name: &'static str,
    pub(crate) ctx: JobContext,
    pub(crate) input: Value,
    pub(crate) reply: oneshot::Sender<JobResult>,
}

impl Job {
    /// Create a job and the ticket its submitter awaits.
    ///
    /// The reply sender lives inside the job and is consumed by exactly one
    /// send; the ticket is consumed by exactly one receive.
    pub fn new(pool: PoolKind, name: &'static str, ctx: JobContext, input: Value) -> (Self, JobTicket) {
        let (reply, rx) = oneshot::channel();
        let job = Self {
            pool,
            name,
            ctx,
            input,
            reply,
        };
        (job, JobTicket { rx })
    }

    pub fn pool(&self) -> PoolKind {
        self.pool
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn context(&self) -> &JobContext {
        &self.ctx
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("pool", &self.pool)
            .field("name", &self.name)
            .field("tx_id", &self.ctx.tx_id)
            .finish_non_exhaustive()
    }
}

/// The job was dropped without producing a result (pool stopped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("job dropped before producing a result")]
pub struct JobDropped;

/// Receiving half of a job's result slot.
#[derive(Debug)]
pub struct JobTicket {
    rx: oneshot::Receiver<JobResult>,
}

impl JobTicket {
    /// Wait for the job's single result.
    ///
    /// Dropping the ticket instead tells the worker nobody is listening.
    pub async fn outcome(self) -> Result<JobResult, JobDropped> {
        self.rx.await.map_err(|_| JobDropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn ctx(in_ms: u64) -> JobContext {
        JobContext::new(TxId::generate(), Instant::now() + Duration::from_millis(in_ms))
    }

    #[tokio::test]
    async fn ticket_receives_the_single_result() {
        let (job, ticket) = Job::new(PoolKind::Primary, "echo", ctx(1_000), json!(1));
        job.reply.send(Ok(json!("done"))).unwrap();
        assert_eq!(ticket.outcome().await, Ok(Ok(json!("done"))));
    }

    #[tokio::test]
    async fn dropped_job_resolves_ticket() {
        let (job, ticket) = Job::new(PoolKind::External, "echo", ctx(1_000), json!(null));
        drop(job);
        assert_eq!(ticket.outcome().await, Err(JobDropped));
    }

    #[test]
    fn dropped_ticket_is_visible_to_sender() {
        let (job, ticket) = Job::new(PoolKind::DataAccess, "echo", ctx(1_000), json!(null));
        assert!(!job.reply.is_closed());
        drop(ticket);
        assert!(job.reply.is_closed());
    }

    #[test]
    fn pool_index_matches_all_order() {
        for (i, kind) in PoolKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }
}
