//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.
//! `AppConfig` is the immutable snapshot; `HotFields` is the subset that may
//! change while the process is running.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::worker::PoolKind;

/// Root configuration for the service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener address, timeouts and body limit.
    pub server: ServerConfig,

    /// Log verbosity and sinks.
    pub logging: LoggingConfig,

    /// Front-door concurrency limit.
    pub concurrency: ConcurrencyConfig,

    /// Worker pool sizing.
    pub pools: PoolsConfig,

    /// Calendar triggers.
    pub scheduler: SchedulerConfig,

    /// Hot reload polling.
    pub reload: ReloadConfig,

    /// Drain behaviour on stop.
    pub shutdown: ShutdownConfig,
}

impl AppConfig {
    /// Extract the hot-reloadable subset.
    pub fn hot_fields(&self) -> HotFields {
        HotFields {
            request_timeout: Duration::from_millis(self.server.request_timeout_ms),
            max_body_bytes: self.server.max_body_bytes,
            log_level: self.logging.level,
        }
    }

    /// Copy the hot fields of `other` into a clone of `self`.
    ///
    /// Everything else keeps the value of `self`.
    pub fn with_hot_fields_of(&self, other: &AppConfig) -> AppConfig {
        let mut next = self.clone();
        next.server.request_timeout_ms = other.server.request_timeout_ms;
        next.server.max_body_bytes = other.server.max_body_bytes;
        next.logging.level = other.logging.level;
        next
    }

    /// Names of restart-only fields that differ between `self` and `other`.
    pub fn restart_required_changes(&self, other: &AppConfig) -> Vec<&'static str> {
        let mut changed = Vec::new();
        let (a, b) = (&self.server, &other.server);
        if a.address != b.address {
            changed.push("server.address");
        }
        if a.read_timeout_secs != b.read_timeout_secs {
            changed.push("server.read_timeout_secs");
        }
        if a.write_timeout_secs != b.write_timeout_secs {
            changed.push("server.write_timeout_secs");
        }
        if a.idle_timeout_secs != b.idle_timeout_secs {
            changed.push("server.idle_timeout_secs");
        }
        if a.timeout_policy != b.timeout_policy {
            changed.push("server.timeout_policy");
        }
        if self.logging.dir != other.logging.dir || self.logging.file_output != other.logging.file_output {
            changed.push("logging.dir/file_output");
        }
        if self.concurrency != other.concurrency {
            changed.push("concurrency");
        }
        if self.pools != other.pools {
            changed.push("pools");
        }
        if self.scheduler != other.scheduler {
            changed.push("scheduler");
        }
        if self.reload != other.reload {
            changed.push("reload");
        }
        if self.shutdown != other.shutdown {
            changed.push("shutdown");
        }
        changed
    }
}

/// The runtime-tunable subset of [`AppConfig`].
///
/// Always read and replaced as a whole value so a request never sees a mix
/// of two reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotFields {
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
    pub log_level: LogLevel,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub address: String,

    /// Upper bound on reading a request body, in seconds.
    pub read_timeout_secs: u64,

    /// Upper bound on writing a response body, in seconds.
    pub write_timeout_secs: u64,

    /// Keep-alive idle timeout, in seconds.
    pub idle_timeout_secs: u64,

    /// Per-request deadline in milliseconds (hot).
    pub request_timeout_ms: u64,

    /// Maximum accepted request body in bytes (hot).
    pub max_body_bytes: usize,

    /// What happens to a handler whose deadline fires.
    pub timeout_policy: TimeoutPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8080".to_string(),
            read_timeout_secs: 5,
            write_timeout_secs: 10,
            idle_timeout_secs: 60,
            request_timeout_ms: 30_000,
            max_body_bytes: 1024 * 1024,
            timeout_policy: TimeoutPolicy::Cancel,
        }
    }
}

/// Handler fate once its deadline has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutPolicy {
    /// Drop the handler; cancellation reaches the dispatched job.
    #[default]
    Cancel,
    /// Leave the handler running in the background and discard its result.
    Detach,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log verbosity (hot).
    pub level: LogLevel,

    /// Directory for the optional log file.
    pub dir: PathBuf,

    /// Also write plain-text logs to `<dir>/workgate.log`.
    pub file_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            dir: PathBuf::from("logs"),
            file_output: false,
        }
    }
}

/// Log verbosity accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    /// Only the most severe events; tracing has no level above `error`.
    Critical,
}

impl LogLevel {
    /// The tracing filter directive level for this verbosity.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Critical => "critical",
            other => other.as_directive(),
        };
        f.write_str(name)
    }
}

/// Admission configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Maximum requests inside the pipeline at once.
    pub max_concurrent_requests: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 1024,
        }
    }
}

/// Sizing for the three worker pools.
///
/// Each pool falls back to its own defaults, field by field, so a section
/// that sets only `workers` keeps that pool's queue capacity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "PoolsFile")]
pub struct PoolsConfig {
    pub primary: PoolConfig,
    pub data_access: PoolConfig,
    pub external: PoolConfig,
}

impl PoolsConfig {
    pub fn get(&self, kind: PoolKind) -> &PoolConfig {
        match kind {
            PoolKind::Primary => &self.primary,
            PoolKind::DataAccess => &self.data_access,
            PoolKind::External => &self.external,
        }
    }
}

impl Default for PoolsConfig {
    fn default() -> Self {
        Self {
            primary: PoolConfig {
                workers: 4,
                queue_capacity: 1024,
            },
            data_access: PoolConfig {
                workers: 2,
                queue_capacity: 256,
            },
            external: PoolConfig {
                workers: 2,
                queue_capacity: 256,
            },
        }
    }
}

/// A single pool: fixed worker count and fixed queue capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

/// `[pools]` as written in the file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PoolsFile {
    primary: PoolOverrides,
    data_access: PoolOverrides,
    external: PoolOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PoolOverrides {
    workers: Option<usize>,
    queue_capacity: Option<usize>,
}

impl PoolOverrides {
    fn over(self, base: PoolConfig) -> PoolConfig {
        PoolConfig {
            workers: self.workers.unwrap_or(base.workers),
            queue_capacity: self.queue_capacity.unwrap_or(base.queue_capacity),
        }
    }
}

impl From<PoolsFile> for PoolsConfig {
    fn from(file: PoolsFile) -> Self {
        let defaults = PoolsConfig::default();
        Self {
            primary: file.primary.over(defaults.primary),
            data_access: file.data_access.over(defaults.data_access),
            external: file.external.over(defaults.external),
        }
    }
}

/// Calendar trigger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    /// IANA timezone name (e.g., "Asia/Seoul").
    pub timezone: String,

    /// Local hour (0-23) at which triggers fire.
    pub run_at_hour: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timezone: "Asia/Seoul".to_string(),
            run_at_hour: 6,
        }
    }
}

/// Hot reload configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    pub enabled: bool,

    /// Polling interval in seconds.
    pub interval_secs: u64,
}

impl ReloadConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 600,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Outer bound on the drain before forced teardown, in seconds.
    pub grace_period_secs: u64,

    /// Let workers finish jobs still queued when the stop signal arrives.
    pub drain_queued_jobs: bool,
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 60,
            drain_queued_jobs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.pools.primary.queue_capacity, 1024);
        assert_eq!(config.shutdown.grace_period(), Duration::from_secs(60));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            request_timeout_ms = 250
            timeout_policy = "detach"

            [logging]
            level = "critical"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.request_timeout_ms, 250);
        assert_eq!(config.server.timeout_policy, TimeoutPolicy::Detach);
        assert_eq!(config.server.max_body_bytes, 1024 * 1024);
        assert_eq!(config.logging.level, LogLevel::Critical);
        assert_eq!(config.logging.level.as_directive(), "error");
    }

    #[test]
    fn hot_fields_merge_leaves_restart_fields_alone() {
        let current = AppConfig::default();
        let mut incoming = AppConfig::default();
        incoming.server.request_timeout_ms = 10;
        incoming.server.address = "127.0.0.1:1".into();
        incoming.pools.primary.workers = 99;

        let merged = current.with_hot_fields_of(&incoming);
        assert_eq!(merged.server.request_timeout_ms, 10);
        assert_eq!(merged.server.address, current.server.address);
        assert_eq!(merged.pools.primary.workers, 4);

        let ignored = current.restart_required_changes(&incoming);
        assert_eq!(ignored, vec!["server.address", "pools"]);
    }

    #[test]
    fn partial_pool_section_keeps_that_pools_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [pools.primary]
            workers = 8

            [pools.external]
            queue_capacity = 16
            "#,
        )
        .unwrap();
        assert_eq!(config.pools.primary, PoolConfig { workers: 8, queue_capacity: 1024 });
        assert_eq!(config.pools.data_access, PoolsConfig::default().data_access);
        assert_eq!(config.pools.external, PoolConfig { workers: 2, queue_capacity: 16 });
    }
}
