//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Wire up middleware (request id, tracing, body timeouts, pipeline)
//! - Accept connections, close idle keep-alive connections and stop on the
//!   shutdown signal

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    middleware,
    routing::{get, post},
    Router,
};
use hyper::{body::Incoming, server::conn::http1, service::service_fn, Request};
use hyper_util::{
    rt::{TokioIo, TokioTimer},
    server::graceful::GracefulShutdown,
};
use tokio::net::TcpListener;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::{
    map_request_body::MapRequestBodyLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::{RequestBodyTimeoutLayer, ResponseBodyTimeoutLayer},
    trace::TraceLayer,
};

use crate::config::schema::{ServerConfig, TimeoutPolicy};
use crate::config::store::ConfigStore;
use crate::http::handlers;
use crate::http::middleware::{access_log, admit, assign_tx_id, enforce_deadline, recover_panics};
use crate::http::request::MakeTxId;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::observability::metrics::PipelineMetrics;
use crate::security::admission::AdmissionGate;
use crate::worker::pools::WorkerPools;

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigStore>,
    pub gate: AdmissionGate,
    pub pools: Arc<WorkerPools>,
    pub metrics: Arc<PipelineMetrics>,
    /// Restart-only; fixed when the router is built.
    pub timeout_policy: TimeoutPolicy,
}

/// Read/write bounds applied to request and response bodies.
#[derive(Debug, Clone, Copy)]
pub struct BodyTimeouts {
    pub read: Duration,
    pub write: Duration,
}

impl From<&ServerConfig> for BodyTimeouts {
    fn from(server: &ServerConfig) -> Self {
        Self {
            read: Duration::from_secs(server.read_timeout_secs),
            write: Duration::from_secs(server.write_timeout_secs),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics))
        .route("/api/v1/ping", get(handlers::ping))
        .route("/api/v1/echo", post(handlers::echo))
}

/// Build the full router. Every route passes through the whole pipeline.
pub fn build_router(state: AppState, timeouts: BodyTimeouts) -> Router {
    apply_pipeline(routes(), state, timeouts)
}

/// Wrap `routes` in the request pipeline.
pub fn apply_pipeline(routes: Router<AppState>, state: AppState, timeouts: BodyTimeouts) -> Router {
    let pipeline = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeTxId))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyTimeoutLayer::new(timeouts.read))
        .layer(ResponseBodyTimeoutLayer::new(timeouts.write))
        .layer(MapRequestBodyLayer::new(Body::new))
        .layer(middleware::from_fn(assign_tx_id))
        .layer(middleware::from_fn(recover_panics))
        .layer(middleware::from_fn_with_state(Arc::clone(&state.metrics), access_log))
        .layer(middleware::from_fn_with_state(state.gate.clone(), admit))
        .layer(middleware::from_fn_with_state(state.clone(), enforce_deadline));

    routes.with_state(state).layer(pipeline)
}

/// Pause after a failed accept so descriptor exhaustion does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// HTTP server for the pipeline.
pub struct HttpServer {
    router: Router,
    idle_timeout: Duration,
}

impl HttpServer {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            idle_timeout: Duration::from_secs(60),
        }
    }

    /// How long a connection may wait for the next request head before it
    /// is closed. Covers idle keep-alive connections.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Serve until the shutdown signal, then stop accepting and let open
    /// connections finish.
    pub async fn run(self, listener: TcpListener, mut signal: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, idle_timeout = ?self.idle_timeout, "HTTP server starting");

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(self.idle_timeout);
        let graceful = GracefulShutdown::new();

        loop {
            let accepted = tokio::select! {
                _ = signal.recv() => break,
                accepted = listener.accept() => accepted,
            };
            let (stream, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            let router = self.router.clone();
            let service = service_fn(move |mut request: Request<Incoming>| {
                request.extensions_mut().insert(ConnectInfo(peer));
                router.clone().oneshot(request)
            });
            let conn = graceful.watch(builder.serve_connection(TokioIo::new(stream), service));
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    tracing::debug!(peer = %peer, error = %e, "Connection closed with error");
                }
            });
        }

        drop(listener);
        tracing::info!("HTTP server stopped accepting, waiting for open connections");
        graceful.shutdown().await;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
