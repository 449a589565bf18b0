//! Shutdown coordination.
//!
//! [`Shutdown`] is the stop signal every long-running task subscribes to.
//! [`ShutdownCoordinator`] drives the ordered drain:
//!
//! ```text
//! close admission gate
//!     → trigger stop signal (workers, reloader, scheduler, listener)
//!     → refuse new jobs; drop queued jobs unless configured to finish them
//!     → wait for in-flight requests       ┐
//!     → wait for workers, abort the rest  ├ one grace period in total
//!     → wait for tracked tasks, abort     ┘
//!     → report Clean or Forced
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{watch, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::security::admission::AdmissionGate;
use crate::worker::pools::WorkerPools;

/// Stop signal sender. Cloning shares the same signal.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Raise the signal. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of the stop signal.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once the signal is raised (immediately if it already was).
    pub async fn recv(&mut self) {
        // A dropped sender means nobody can keep us running either.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Everything finished inside the grace period.
    Clean,
    /// Something was still running at the deadline and was torn down.
    Forced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub outcome: DrainOutcome,
    /// Requests still holding a slot when the wait for them ended.
    pub in_flight_requests: usize,
    pub aborted_workers: usize,
    pub aborted_tasks: usize,
    pub discarded_jobs: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Running,
    Draining,
    Stopped,
}

pub struct ShutdownCoordinator {
    shutdown: Shutdown,
    gate: AdmissionGate,
    pools: Arc<WorkerPools>,
    grace: Duration,
    drain_queued: bool,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
    state: Mutex<CoordinatorState>,
    report: OnceCell<DrainReport>,
}

impl ShutdownCoordinator {
    pub fn new(
        shutdown: Shutdown,
        gate: AdmissionGate,
        pools: Arc<WorkerPools>,
        grace: Duration,
        drain_queued: bool,
    ) -> Self {
        Self {
            shutdown,
            gate,
            pools,
            grace,
            drain_queued,
            tasks: Mutex::new(Vec::new()),
            state: Mutex::new(CoordinatorState::Running),
            report: OnceCell::new(),
        }
    }

    /// Register a background task that must finish (or be aborted) on drain.
    pub fn track_task(&self, name: &'static str, handle: JoinHandle<()>) {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((name, handle));
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn grace_period(&self) -> Duration {
        self.grace
    }

    /// Run the drain sequence. Only the first call does any work; later and
    /// concurrent callers wait for it and get the same report.
    pub async fn drain(&self) -> DrainReport {
        self.report.get_or_init(|| self.run_drain()).await.clone()
    }

    async fn run_drain(&self) -> DrainReport {
        let started = Instant::now();
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = CoordinatorState::Draining;
        let deadline = started + self.grace;

        tracing::info!(
            grace_period_secs = self.grace.as_secs_f64(),
            in_flight = self.gate.in_flight(),
            "Draining"
        );

        self.gate.close();
        self.shutdown.trigger();
        self.pools.stop_accepting();

        let mut discarded_jobs = 0;
        if !self.drain_queued {
            discarded_jobs += self.pools.discard_backlog();
        }

        let requests_done = tokio::time::timeout_at(deadline, self.gate.wait_idle())
            .await
            .is_ok();
        let in_flight_requests = self.gate.in_flight();
        if !requests_done {
            tracing::warn!(in_flight = in_flight_requests, "Requests still in flight at deadline");
        }

        let workers = self.pools.join(deadline).await;
        discarded_jobs += self.pools.discard_backlog();

        let aborted_tasks = self.join_tasks(deadline).await;

        let outcome = if requests_done && workers.aborted == 0 && aborted_tasks == 0 {
            DrainOutcome::Clean
        } else {
            DrainOutcome::Forced
        };

        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = CoordinatorState::Stopped;

        DrainReport {
            outcome,
            in_flight_requests,
            aborted_workers: workers.aborted,
            aborted_tasks,
            discarded_jobs,
            elapsed: started.elapsed(),
        }
    }

    async fn join_tasks(&self, deadline: Instant) -> usize {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()));
        let mut aborted = 0;
        for (name, mut handle) in tasks {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => tracing::debug!(task = name, "Task stopped"),
                Ok(Err(err)) => tracing::error!(task = name, error = %err, "Task ended abnormally"),
                Err(_) => {
                    handle.abort();
                    aborted += 1;
                    tracing::warn!(task = name, "Task did not stop in time, aborted");
                }
            }
        }
        aborted
    }
}
