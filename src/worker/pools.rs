//! The primary, data-access and external pools as one set.

use std::sync::Arc;

use serde_json::Value;
use tokio::time::Instant;

use crate::config::schema::PoolsConfig;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::observability::metrics::PipelineMetrics;
use crate::worker::executor::Executors;
use crate::worker::job::{Job, JobContext, JobTicket, PoolKind};
use crate::worker::pool::{JoinOutcome, SubmitError, WorkerPool, WorkerState};

#[derive(Debug)]
pub struct WorkerPools {
    pools: [WorkerPool; 3],
}

impl WorkerPools {
    pub fn start(
        config: &PoolsConfig,
        executors: &Executors,
        signal: &ShutdownSignal,
        drain_queued: bool,
        metrics: &Arc<PipelineMetrics>,
    ) -> Self {
        let pools = PoolKind::ALL.map(|kind| {
            WorkerPool::start(
                kind,
                config.get(kind),
                Arc::clone(executors.get(kind)),
                signal.clone(),
                drain_queued,
                Arc::clone(metrics),
            )
        });
        Self { pools }
    }

    pub fn get(&self, kind: PoolKind) -> &WorkerPool {
        &self.pools[kind.index()]
    }

    /// Route a job to its pool.
    pub fn submit(&self, job: Job) -> Result<(), SubmitError> {
        self.get(job.pool()).submit(job)
    }

    /// Build a job, submit it, and hand back the ticket.
    pub fn dispatch(
        &self,
        pool: PoolKind,
        name: &'static str,
        ctx: JobContext,
        input: Value,
    ) -> Result<JobTicket, SubmitError> {
        let (job, ticket) = Job::new(pool, name, ctx, input);
        self.submit(job)?;
        Ok(ticket)
    }

    pub fn stop_accepting(&self) {
        self.pools.iter().for_each(WorkerPool::stop_accepting);
    }

    pub fn discard_backlog(&self) -> usize {
        self.pools.iter().map(WorkerPool::discard_backlog).sum()
    }

    pub fn queued(&self) -> usize {
        self.pools.iter().map(WorkerPool::queue_len).sum()
    }

    pub fn states(&self, kind: PoolKind) -> Vec<WorkerState> {
        self.get(kind).states()
    }

    /// Join every pool against the same deadline.
    pub async fn join(&self, deadline: Instant) -> JoinOutcome {
        let outcomes = futures_util::future::join_all(self.pools.iter().map(|p| p.join(deadline))).await;
        outcomes.into_iter().fold(JoinOutcome::default(), |acc, o| JoinOutcome {
            finished: acc.finished + o.finished,
            aborted: acc.aborted + o.aborted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{PoolConfig, PoolsConfig};
    use crate::lifecycle::shutdown::Shutdown;
    use crate::observability::correlation::TxId;
    use crate::worker::executor::{JobExecutor, JobFuture};
    use serde_json::json;
    use std::time::Duration;

    fn small() -> PoolsConfig {
        let pool = PoolConfig {
            workers: 1,
            queue_capacity: 1,
        };
        PoolsConfig {
            primary: pool.clone(),
            data_access: pool.clone(),
            external: pool,
        }
    }

    fn ctx() -> JobContext {
        JobContext::new(TxId::generate(), Instant::now() + Duration::from_secs(5))
    }

    #[tokio::test]
    async fn saturation_is_per_pool() {
        let shutdown = Shutdown::new();
        let blocked: Arc<dyn JobExecutor> = Arc::new(|_: &'static str, _: &JobContext, _: Value| -> JobFuture {
            Box::pin(futures_util::future::pending())
        });
        let executors = Executors {
            primary: blocked,
            ..Executors::default()
        };
        let pools = WorkerPools::start(
            &small(),
            &executors,
            &shutdown.subscribe(),
            false,
            &Arc::new(PipelineMetrics::new()),
        );

        let mut held = Vec::new();
        let mut saturated = false;
        for _ in 0..4 {
            match pools.dispatch(PoolKind::Primary, "block", ctx(), json!(null)) {
                Ok(ticket) => held.push(ticket),
                Err(err) => {
                    assert_eq!(err, SubmitError::Saturated { pool: PoolKind::Primary });
                    saturated = true;
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(saturated);

        let ticket = pools
            .dispatch(PoolKind::External, "echo", ctx(), json!("other"))
            .unwrap();
        assert_eq!(ticket.outcome().await, Ok(Ok(json!("other"))));

        shutdown.trigger();
        pools.stop_accepting();
        let outcome = pools.join(Instant::now() + Duration::from_millis(100)).await;
        assert_eq!(outcome.finished + outcome.aborted, 3);
    }
}
