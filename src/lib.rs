//! Admission, deadline and dispatch pipeline for an HTTP service.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod scheduler;
pub mod security;
pub mod worker;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::{Application, Shutdown};
