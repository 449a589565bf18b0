//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, sizes >= 1)
//! - Check the bind address and timezone parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system, at startup and on reload

use std::net::SocketAddr;

use chrono_tz::Tz;
use thiserror::Error;

use crate::config::schema::{AppConfig, PoolConfig};
use crate::worker::PoolKind;

/// A single semantic problem in a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let server = &config.server;
    if server.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.address",
            format!("'{}' is not a socket address", server.address),
        ));
    }
    for (field, value) in [
        ("server.read_timeout_secs", server.read_timeout_secs),
        ("server.write_timeout_secs", server.write_timeout_secs),
        ("server.idle_timeout_secs", server.idle_timeout_secs),
        ("server.request_timeout_ms", server.request_timeout_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be > 0"));
        }
    }
    if server.max_body_bytes == 0 {
        errors.push(ValidationError::new("server.max_body_bytes", "must be > 0"));
    }

    if config.concurrency.max_concurrent_requests == 0 {
        errors.push(ValidationError::new(
            "concurrency.max_concurrent_requests",
            "must be >= 1",
        ));
    }

    for kind in PoolKind::ALL {
        validate_pool(kind, config.pools.get(kind), &mut errors);
    }

    if config.scheduler.timezone.parse::<Tz>().is_err() {
        errors.push(ValidationError::new(
            "scheduler.timezone",
            format!("unknown timezone '{}'", config.scheduler.timezone),
        ));
    }
    if config.scheduler.run_at_hour > 23 {
        errors.push(ValidationError::new("scheduler.run_at_hour", "must be 0-23"));
    }

    if config.reload.enabled && config.reload.interval_secs == 0 {
        errors.push(ValidationError::new("reload.interval_secs", "must be > 0"));
    }
    if config.shutdown.grace_period_secs == 0 {
        errors.push(ValidationError::new("shutdown.grace_period_secs", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_pool(kind: PoolKind, pool: &PoolConfig, errors: &mut Vec<ValidationError>) {
    if pool.workers == 0 {
        errors.push(ValidationError::new(
            format!("pools.{}.workers", kind.as_str()),
            "must be >= 1",
        ));
    }
    if pool.queue_capacity == 0 {
        errors.push(ValidationError::new(
            format!("pools.{}.queue_capacity", kind.as_str()),
            "must be >= 1",
        ));
    }
}
