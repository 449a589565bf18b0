//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, tracing, body timeouts)
//!     → middleware/ (tx id, panic recovery, access log, admission, deadline)
//!     → handlers.rs (health checks, metrics, ping, echo → worker pool)
//!     → response.rs (envelope, error mapping)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeTxId, RequestContext};
pub use response::{ApiError, Envelope, PipelineError};
pub use server::{apply_pipeline, build_router, routes, AppState, BodyTimeouts, HttpServer};
