//! workgate (v0.1)
//!
//! An HTTP service core that bounds concurrency, enforces per-request
//! deadlines and dispatches work to bounded worker pools.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id → tx id → recover → access log → admit → deadline ─┐
//!                                                                                   │
//!                                                                                   ▼
//!                                                                              handlers
//!                                                                                   │
//!                                  ┌────────────────────────────────────────────────┤
//!                                  ▼                    ▼                    ▼
//!                           primary pool        data-access pool      external pool
//!                          (bounded queue)      (bounded queue)      (bounded queue)
//!
//!     Cross-cutting: hot config store + reloader, metrics registry,
//!                    scheduler, shutdown coordinator
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use workgate::config::ConfigStore;
use workgate::lifecycle::signals::wait_for_stop_signal;
use workgate::lifecycle::{Application, DrainOutcome};
use workgate::observability::logging;
use workgate::worker::Executors;

#[derive(Parser)]
#[command(name = "workgate", version, about = "Admission, deadline and dispatch pipeline")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "WORKGATE_CONFIG", default_value = "config/workgate.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let store = match ConfigStore::load(&args.config) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("failed to load {}: {e}", args.config.display());
            return Err(e.into());
        }
    };

    let log_level = logging::init(&store.snapshot().logging)?;
    tracing::info!(config = %args.config.display(), "workgate v{} starting", env!("CARGO_PKG_VERSION"));

    let app = Application::build(Arc::clone(&store), Executors::default(), Some(log_level))?;
    let listener = app.bind().await?;
    let addr = app.serve(listener)?;
    tracing::info!(address = %addr, "Listening for connections");

    let signal = wait_for_stop_signal().await?;
    tracing::info!(signal, "Shutdown signal received");

    let report = app.shutdown().await;
    match report.outcome {
        DrainOutcome::Clean => tracing::info!(
            elapsed_ms = report.elapsed.as_millis() as u64,
            discarded_jobs = report.discarded_jobs,
            "Shutdown complete"
        ),
        DrainOutcome::Forced => tracing::warn!(
            elapsed_ms = report.elapsed.as_millis() as u64,
            in_flight_requests = report.in_flight_requests,
            aborted_workers = report.aborted_workers,
            aborted_tasks = report.aborted_tasks,
            discarded_jobs = report.discarded_jobs,
            "Shutdown forced after grace period"
        ),
    }
    Ok(())
}
