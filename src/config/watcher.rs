//! Periodic configuration reload.

use std::sync::Arc;
use std::time::Duration;

use crate::config::loader::ConfigError;
use crate::config::store::{ConfigStore, ReloadOutcome};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::observability::logging::LogLevelHandle;

/// Polls the backing file on a fixed interval and applies hot fields.
pub struct ConfigReloader {
    store: Arc<ConfigStore>,
    interval: Duration,
    log_level: Option<LogLevelHandle>,
}

impl ConfigReloader {
    pub fn new(store: Arc<ConfigStore>, interval: Duration, log_level: Option<LogLevelHandle>) -> Self {
        Self {
            store,
            interval,
            log_level,
        }
    }

    /// Check once; failures leave the current snapshot in place.
    pub fn check(&self) -> Result<ReloadOutcome, ConfigError> {
        let outcome = self.store.reload_if_changed()?;
        if let ReloadOutcome::Applied {
            previous,
            current,
            ignored,
        } = &outcome
        {
            tracing::info!(
                request_timeout_ms = current.request_timeout.as_millis() as u64,
                max_body_bytes = current.max_body_bytes,
                log_level = %current.log_level,
                "Configuration reloaded"
            );
            if !ignored.is_empty() {
                tracing::warn!(fields = ?ignored, "Changed fields need a restart and were not applied");
            }
            if previous.log_level != current.log_level {
                if let Some(handle) = &self.log_level {
                    if let Err(e) = handle.set_level(current.log_level) {
                        tracing::error!(error = %e, "Failed to apply new log level");
                    }
                }
            }
        }
        Ok(outcome)
    }

    /// Run until the stop signal.
    pub async fn run(self, mut signal: ShutdownSignal) {
        tracing::info!(
            path = ?self.store.path(),
            interval_secs = self.interval.as_secs(),
            "Config reloader started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the initial load already happened.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = signal.recv() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.check() {
                        tracing::error!(error = %e, "Failed to reload config. Keeping current configuration.");
                    }
                }
            }
        }
        tracing::debug!("Config reloader stopped");
    }
}
