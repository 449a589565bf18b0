//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from one configuration snapshot
//! - Start background tasks (workers, config reloader, scheduler)
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener starts last (traffic only when ready)
//! - Every background task is registered with the shutdown coordinator

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::loader::ConfigError;
use crate::config::store::ConfigStore;
use crate::config::watcher::ConfigReloader;
use crate::http::server::{build_router, AppState, BodyTimeouts, HttpServer};
use crate::lifecycle::shutdown::{DrainReport, Shutdown, ShutdownCoordinator};
use crate::observability::logging::LogLevelHandle;
use crate::observability::metrics::PipelineMetrics;
use crate::scheduler::{Scheduler, SchedulerError};
use crate::security::admission::AdmissionGate;
use crate::worker::executor::Executors;
use crate::worker::pools::WorkerPools;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// The assembled service.
pub struct Application {
    store: Arc<ConfigStore>,
    state: AppState,
    router: Router,
    shutdown: Shutdown,
    coordinator: ShutdownCoordinator,
}

impl Application {
    /// Build all subsystems and start background tasks.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn build(
        store: Arc<ConfigStore>,
        executors: Executors,
        log_level: Option<LogLevelHandle>,
    ) -> Result<Self, StartupError> {
        let config = store.snapshot();
        let metrics = Arc::new(PipelineMetrics::new());
        let shutdown = Shutdown::new();

        let gate = AdmissionGate::new(config.concurrency.max_concurrent_requests, Arc::clone(&metrics));
        let pools = Arc::new(WorkerPools::start(
            &config.pools,
            &executors,
            &shutdown.subscribe(),
            config.shutdown.drain_queued_jobs,
            &metrics,
        ));

        let coordinator = ShutdownCoordinator::new(
            shutdown.clone(),
            gate.clone(),
            Arc::clone(&pools),
            config.shutdown.grace_period(),
            config.shutdown.drain_queued_jobs,
        );

        if config.reload.enabled && store.path().is_some() {
            let reloader = ConfigReloader::new(Arc::clone(&store), config.reload.interval(), log_level);
            coordinator.track_task("config-reloader", tokio::spawn(reloader.run(shutdown.subscribe())));
        }

        if config.scheduler.enabled {
            let scheduler = Scheduler::from_config(&config.scheduler)?;
            coordinator.track_task("scheduler", tokio::spawn(scheduler.run(shutdown.subscribe())));
        }

        let state = AppState {
            config: Arc::clone(&store),
            gate,
            pools,
            metrics,
            timeout_policy: config.server.timeout_policy,
        };
        let router = build_router(state.clone(), BodyTimeouts::from(&config.server));

        tracing::info!(
            max_concurrent_requests = config.concurrency.max_concurrent_requests,
            request_timeout_ms = config.server.request_timeout_ms,
            timeout_policy = ?config.server.timeout_policy,
            "Application initialized"
        );

        Ok(Self {
            store,
            state,
            router,
            shutdown,
            coordinator,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, StartupError> {
        let address = self.store.snapshot().server.address.clone();
        TcpListener::bind(&address)
            .await
            .map_err(|source| StartupError::Bind { address, source })
    }

    /// Start serving on `listener` in the background.
    pub fn serve(&self, listener: TcpListener) -> Result<SocketAddr, StartupError> {
        let addr = listener.local_addr()?;
        let idle_timeout = Duration::from_secs(self.store.snapshot().server.idle_timeout_secs);
        let server = HttpServer::new(self.router()).with_idle_timeout(idle_timeout);
        let signal = self.shutdown.subscribe();
        let handle = tokio::spawn(async move {
            if let Err(e) = server.run(listener, signal).await {
                tracing::error!(error = %e, "HTTP server failed");
            }
        });
        self.coordinator.track_task("http-server", handle);
        Ok(addr)
    }

    pub fn coordinator(&self) -> &ShutdownCoordinator {
        &self.coordinator
    }

    /// Drain and stop everything.
    pub async fn shutdown(&self) -> DrainReport {
        self.coordinator.drain().await
    }
}
