//! Job execution logic plugged into a pool.
//!
//! The pool knows nothing about what a job does; it hands each job to its
//! executor and expects one [`JobResult`] back.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::worker::job::{JobContext, JobResult, PoolKind};

/// Future returned by an executor for one job.
pub type JobFuture = BoxFuture<'static, JobResult>;

/// Type-specific job logic for one pool.
pub trait JobExecutor: Send + Sync + 'static {
    fn execute(&self, name: &'static str, ctx: &JobContext, input: Value) -> JobFuture;
}

impl<F> JobExecutor for F
where
    F: Fn(&'static str, &JobContext, Value) -> JobFuture + Send + Sync + 'static,
{
    fn execute(&self, name: &'static str, ctx: &JobContext, input: Value) -> JobFuture {
        self(name, ctx, input)
    }
}

/// Returns its input unchanged after an optional processing delay.
#[derive(Debug, Clone, Default)]
pub struct EchoExecutor {
    delay: Duration,
}

impl EchoExecutor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl JobExecutor for EchoExecutor {
    fn execute(&self, name: &'static str, ctx: &JobContext, input: Value) -> JobFuture {
        let delay = self.delay;
        tracing::debug!(tx_id = %ctx.tx_id, job = name, "Echo job running");
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(input)
        })
    }
}

/// One executor per pool.
#[derive(Clone)]
pub struct Executors {
    pub primary: Arc<dyn JobExecutor>,
    pub data_access: Arc<dyn JobExecutor>,
    pub external: Arc<dyn JobExecutor>,
}

impl Executors {
    /// Use the same executor for every pool.
    pub fn uniform(executor: Arc<dyn JobExecutor>) -> Self {
        Self {
            primary: Arc::clone(&executor),
            data_access: Arc::clone(&executor),
            external: executor,
        }
    }

    pub fn get(&self, kind: PoolKind) -> &Arc<dyn JobExecutor> {
        match kind {
            PoolKind::Primary => &self.primary,
            PoolKind::DataAccess => &self.data_access,
            PoolKind::External => &self.external,
        }
    }
}

impl Default for Executors {
    /// Primary logic simulates a short processing step; the other pools
    /// pass their input straight through.
    fn default() -> Self {
        Self {
            primary: Arc::new(EchoExecutor::new(Duration::from_millis(10))),
            data_access: Arc::new(EchoExecutor::default()),
            external: Arc::new(EchoExecutor::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::correlation::TxId;
    use serde_json::json;
    use tokio::time::Instant;

    #[tokio::test]
    async fn echo_returns_input() {
        let ctx = JobContext::new(TxId::generate(), Instant::now() + Duration::from_secs(1));
        let out = EchoExecutor::default()
            .execute("echo", &ctx, json!({"message": "hi"}))
            .await;
        assert_eq!(out, Ok(json!({"message": "hi"})));
    }

    #[tokio::test]
    async fn closures_are_executors() {
        let exec = |_: &'static str, _: &JobContext, input: Value| -> JobFuture {
            Box::pin(async move { Ok(json!([input])) })
        };
        let ctx = JobContext::new(TxId::generate(), Instant::now() + Duration::from_secs(1));
        assert_eq!(exec.execute("wrap", &ctx, json!(1)).await, Ok(json!([1])));
    }
}
