//! A single bounded worker pool.
//!
//! # Responsibilities
//! - Own a bounded FIFO queue of jobs and a fixed set of workers
//! - Reject submissions immediately when the queue is full
//! - Run each job through the pool's executor and deliver one result
//! - Stop workers on the shutdown signal; report per-worker state
//!
//! # Design Decisions
//! - Workers are tokio tasks pulling from one MPMC queue (`flume`)
//! - The pool keeps a receiver of its own so shutdown can discard the
//!   backlog; a discarded job drops its reply slot, which its caller sees
//! - A worker waiting for a job also waits on the stop signal

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::schema::PoolConfig;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::observability::metrics::PipelineMetrics;
use crate::resilience::panics::panic_message;
use crate::worker::executor::JobExecutor;
use crate::worker::job::{Job, JobError, PoolKind};

/// Why a job was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("{pool} queue is full")]
    Saturated { pool: PoolKind },
    #[error("{pool} pool is stopped")]
    Stopped { pool: PoolKind },
}

/// Lifecycle of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    /// Waiting on the queue (or the stop signal).
    Dequeuing = 1,
    Executing = 2,
    Stopping = 3,
    Stopped = 4,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Dequeuing,
            2 => WorkerState::Executing,
            3 => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }
}

/// Outcome of waiting for a pool's workers to exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinOutcome {
    pub finished: usize,
    pub aborted: usize,
}

pub struct WorkerPool {
    kind: PoolKind,
    capacity: usize,
    tx: flume::Sender<Job>,
    backlog: flume::Receiver<Job>,
    states: Arc<[AtomicU8]>,
    handles: Mutex<Vec<(usize, JoinHandle<()>)>>,
    accepting: AtomicBool,
    metrics: Arc<PipelineMetrics>,
}

impl WorkerPool {
    /// Spawn `config.workers` workers on the current runtime.
    pub fn start(
        kind: PoolKind,
        config: &PoolConfig,
        executor: Arc<dyn JobExecutor>,
        signal: ShutdownSignal,
        drain_queued: bool,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        let (tx, rx) = flume::bounded(config.queue_capacity);
        let states: Arc<[AtomicU8]> = (0..config.workers)
            .map(|_| AtomicU8::new(WorkerState::Idle as u8))
            .collect();

        let handles = (0..config.workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    kind,
                    rx: rx.clone(),
                    executor: Arc::clone(&executor),
                    states: Arc::clone(&states),
                    metrics: Arc::clone(&metrics),
                };
                (id, tokio::spawn(worker.run(signal.clone(), drain_queued)))
            })
            .collect();

        tracing::info!(
            pool = %kind,
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "Worker pool started"
        );

        Self {
            kind,
            capacity: config.queue_capacity,
            tx,
            backlog: rx,
            states,
            handles: Mutex::new(handles),
            accepting: AtomicBool::new(true),
            metrics,
        }
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    /// Enqueue without waiting. A full queue is rejected, never blocked on.
    pub fn submit(&self, job: Job) -> Result<(), SubmitError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(SubmitError::Stopped { pool: self.kind });
        }
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(flume::TrySendError::Full(job)) => {
                self.metrics.backpressure(self.kind);
                tracing::warn!(
                    pool = %self.kind,
                    tx_id = %job.ctx.tx_id,
                    capacity = self.capacity,
                    "Queue full, rejecting job"
                );
                Err(SubmitError::Saturated { pool: self.kind })
            }
            Err(flume::TrySendError::Disconnected(_)) => Err(SubmitError::Stopped { pool: self.kind }),
        }
    }

    /// Refuse further submissions.
    pub fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    pub fn queue_len(&self) -> usize {
        self.tx.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn states(&self) -> Vec<WorkerState> {
        self.states
            .iter()
            .map(|s| WorkerState::from_u8(s.load(Ordering::Acquire)))
            .collect()
    }

    /// Drop every queued job. Their callers observe a dropped reply slot.
    pub fn discard_backlog(&self) -> usize {
        let discarded = self.backlog.drain().count();
        if discarded > 0 {
            tracing::warn!(pool = %self.kind, discarded, "Discarded queued jobs");
        }
        discarded
    }

    /// Wait for workers to exit until `deadline`, then abort the rest.
    pub async fn join(&self, deadline: Instant) -> JoinOutcome {
        let handles = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        let mut outcome = JoinOutcome::default();
        for (id, mut handle) in handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(_) => outcome.finished += 1,
                Err(_) => {
                    handle.abort();
                    self.states[id].store(WorkerState::Stopped as u8, Ordering::Release);
                    tracing::warn!(pool = %self.kind, worker = id, "Worker did not stop in time, aborted");
                    outcome.aborted += 1;
                }
            }
        }
        outcome
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("kind", &self.kind)
            .field("capacity", &self.capacity)
            .field("queued", &self.queue_len())
            .field("states", &self.states())
            .finish()
    }
}

struct Worker {
    id: usize,
    kind: PoolKind,
    rx: flume::Receiver<Job>,
    executor: Arc<dyn JobExecutor>,
    states: Arc<[AtomicU8]>,
    metrics: Arc<PipelineMetrics>,
}

impl Worker {
    async fn run(self, mut signal: ShutdownSignal, drain_queued: bool) {
        loop {
            self.set(WorkerState::Dequeuing);
            let next = tokio::select! {
                biased;
                _ = signal.recv() => None,
                job = self.rx.recv_async() => job.ok(),
            };
            let Some(job) = next else { break };
            self.process(job).await;
            self.set(WorkerState::Idle);
        }

        self.set(WorkerState::Stopping);
        if drain_queued {
            while let Ok(job) = self.rx.try_recv() {
                self.process(job).await;
                self.set(WorkerState::Stopping);
            }
        }
        self.set(WorkerState::Stopped);
        tracing::debug!(pool = %self.kind, worker = self.id, "Worker stopped");
    }

    async fn process(&self, job: Job) {
        let Job {
            name,
            ctx,
            input,
            mut reply,
            ..
        } = job;

        if reply.is_closed() {
            tracing::debug!(pool = %self.kind, tx_id = %ctx.tx_id, job = name, "Caller gone, skipping job");
            return;
        }
        if ctx.is_expired() {
            tracing::debug!(pool = %self.kind, tx_id = %ctx.tx_id, job = name, "Deadline passed while queued");
            let _ = reply.send(Err(JobError::DeadlineExceeded));
            return;
        }

        self.set(WorkerState::Executing);
        let started = Instant::now();

        let result = match std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.executor.execute(name, &ctx, input)
        })) {
            Ok(fut) => {
                tokio::select! {
                    res = AssertUnwindSafe(fut).catch_unwind() => {
                        res.unwrap_or_else(|payload| Err(JobError::Panicked(panic_message(&*payload))))
                    }
                    _ = reply.closed() => {
                        tracing::debug!(pool = %self.kind, tx_id = %ctx.tx_id, job = name, "Caller abandoned job");
                        return;
                    }
                    _ = tokio::time::sleep_until(ctx.deadline) => Err(JobError::DeadlineExceeded),
                }
            }
            Err(payload) => Err(JobError::Panicked(panic_message(&*payload))),
        };

        match &result {
            Ok(_) => tracing::debug!(
                pool = %self.kind,
                worker = self.id,
                tx_id = %ctx.tx_id,
                job = name,
                duration_ms = started.elapsed().as_millis() as u64,
                "Job completed"
            ),
            Err(JobError::DeadlineExceeded) => tracing::debug!(
                pool = %self.kind,
                tx_id = %ctx.tx_id,
                job = name,
                "Job hit its deadline"
            ),
            Err(err) => {
                self.metrics.job_failed(self.kind);
                tracing::error!(
                    pool = %self.kind,
                    worker = self.id,
                    tx_id = %ctx.tx_id,
                    job = name,
                    error = %err,
                    "Job failed"
                );
            }
        }

        let _ = reply.send(result);
    }

    fn set(&self, state: WorkerState) {
        self.states[self.id].store(state as u8, Ordering::Release);
    }
}
