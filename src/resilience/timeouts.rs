//! Deadline enforcement.
//!
//! # Responsibilities
//! - Race a request's work against its deadline
//! - Surface a distinct error when the deadline wins
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - `with_deadline` drops the work when the deadline fires, which cancels
//!   everything it owns (including the result slot of any dispatched job)
//! - `with_deadline_detached` lets the work keep running in its own task and
//!   discards its result; a slow handler can pile up background tasks
//! - A panic inside detached work is re-raised in the caller so the panic
//!   recovery layer still sees it

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {0:?} exceeded")]
pub struct DeadlineExceeded(pub Duration);

/// Run `work` until it finishes or `timeout` elapses, dropping it on timeout.
pub async fn with_deadline<F>(timeout: Duration, work: F) -> Result<F::Output, DeadlineExceeded>
where
    F: Future,
{
    tokio::time::timeout(timeout, work)
        .await
        .map_err(|_| DeadlineExceeded(timeout))
}

/// Run `work` in its own task; on timeout return immediately and leave it running.
pub async fn with_deadline_detached<F>(timeout: Duration, work: F) -> Result<F::Output, DeadlineExceeded>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let mut task = tokio::spawn(work);
    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Ok(Err(_)) => Err(DeadlineExceeded(timeout)),
        Err(_) => {
            tracing::debug!(timeout_ms = timeout.as_millis() as u64, "Deadline hit, work left running");
            Err(DeadlineExceeded(timeout))
        }
    }
}
