//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level at runtime (hot reload)
//! - Optionally mirror logs into a file under the configured directory
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - The level filter sits in a `reload` layer so a config reload can swap it
//! - `RUST_LOG` wins over the configured level at startup

use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::config::schema::{LogLevel, LoggingConfig};

const LOG_FILE_NAME: &str = "workgate.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to prepare log directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
    #[error("failed to swap log filter: {0}")]
    Reload(#[from] reload::Error),
}

/// Handle used to change the active log level after startup.
#[derive(Clone)]
pub struct LogLevelHandle {
    inner: reload::Handle<EnvFilter, Registry>,
}

impl LogLevelHandle {
    pub fn set_level(&self, level: LogLevel) -> Result<(), LoggingError> {
        self.inner.reload(filter_for(level))?;
        Ok(())
    }

    /// The active filter directives, or `None` once the subscriber is gone.
    pub fn filter(&self) -> Option<String> {
        self.inner.with_current(|filter| filter.to_string()).ok()
    }
}

/// A swappable filter layer and the handle that swaps it.
pub fn reloadable_filter(initial: EnvFilter) -> (reload::Layer<EnvFilter, Registry>, LogLevelHandle) {
    let (layer, inner) = reload::Layer::new(initial);
    (layer, LogLevelHandle { inner })
}

/// Build the filter for a configured level.
pub fn filter_for(level: LogLevel) -> EnvFilter {
    let lvl = level.as_directive();
    EnvFilter::new(format!("workgate={lvl},tower_http={lvl}"))
}

/// Install the global subscriber.
pub fn init(config: &LoggingConfig) -> Result<LogLevelHandle, LoggingError> {
    let initial = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(config.level));
    let (filter, handle) = reloadable_filter(initial);

    let file_layer = if config.file_output {
        fs::create_dir_all(&config.dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.dir.join(LOG_FILE_NAME))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()?;

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_filters_like_error() {
        assert_eq!(
            filter_for(LogLevel::Critical).to_string(),
            filter_for(LogLevel::Error).to_string()
        );
    }

    #[test]
    fn handle_swaps_the_live_filter() {
        let (layer, handle) = reloadable_filter(filter_for(LogLevel::Info));
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(layer));
        assert!(handle.filter().unwrap().contains("workgate=info"));

        handle.set_level(LogLevel::Debug).unwrap();
        assert!(handle.filter().unwrap().contains("workgate=debug"));
    }
}
