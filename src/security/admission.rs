//! Admission gate.
//!
//! # Responsibilities
//! - Bound the number of requests processed at once
//! - Reject (never queue) requests beyond the bound
//! - Release the slot on every exit path via an RAII permit
//! - Let shutdown close the gate and wait for in-flight requests
//!
//! # Design Decisions
//! - A tokio `Semaphore` with `try_acquire_owned`; closing the semaphore is
//!   how the gate stops admitting during drain
//! - Occupancy is tracked next to the semaphore so drain can wait for zero.
//!   It is counted before the permit is taken, so drain never observes zero
//!   while an admitted request is still uncounted

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::observability::metrics::PipelineMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("concurrency limit reached")]
    Saturated,
    #[error("server is shutting down")]
    Closed,
}

struct Inner {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: AtomicUsize,
    idle: Notify,
    metrics: Arc<PipelineMetrics>,
}

impl Inner {
    fn release_slot(&self) {
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub struct AdmissionGate {
    inner: Arc<Inner>,
}

impl AdmissionGate {
    pub fn new(capacity: usize, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            inner: Arc::new(Inner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                metrics,
            }),
        }
    }

    /// Take a slot if one is free right now.
    pub fn try_admit(&self) -> Result<AdmissionPermit, AdmissionError> {
        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        match Arc::clone(&self.inner.semaphore).try_acquire_owned() {
            Ok(permit) => {
                self.inner.metrics.request_admitted();
                Ok(AdmissionPermit {
                    _permit: permit,
                    gate: Arc::clone(&self.inner),
                })
            }
            Err(TryAcquireError::NoPermits) => {
                self.inner.release_slot();
                self.inner.metrics.admission_rejected();
                Err(AdmissionError::Saturated)
            }
            Err(TryAcquireError::Closed) => {
                self.inner.release_slot();
                Err(AdmissionError::Closed)
            }
        }
    }

    /// Stop admitting. Permits already handed out stay valid.
    pub fn close(&self) {
        self.inner.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.semaphore.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Resolve once no permit is outstanding.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("capacity", &self.inner.capacity)
            .field("in_flight", &self.in_flight())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// One occupied slot. Dropping it releases the slot.
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    gate: Arc<Inner>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.gate.metrics.request_released();
        self.gate.release_slot();
    }
}

impl std::fmt::Debug for AdmissionPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionPermit").finish_non_exhaustive()
    }
}
