//! Hot configuration store.
//!
//! Holds the current [`AppConfig`] behind an `ArcSwap`. Readers load one
//! immutable snapshot and derive everything from it, so the hot fields they
//! see always come from a single reload. A reload builds a complete new
//! snapshot (old restart-only fields + new hot fields) and swaps it in with a
//! single store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::config::loader::{load_config, ConfigError, SourceFingerprint};
use crate::config::schema::{AppConfig, HotFields};

/// Result of a reload check that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The backing source has not changed since the last successful load.
    Unchanged,
    /// New hot fields were swapped in.
    Applied {
        previous: HotFields,
        current: HotFields,
        /// Restart-only fields that differ in the source and were not applied.
        ignored: Vec<&'static str>,
    },
}

pub struct ConfigStore {
    path: Option<PathBuf>,
    current: ArcSwap<AppConfig>,
    /// Fingerprint of the last successfully applied source. The mutex also
    /// serializes reload checks.
    fingerprint: Mutex<Option<SourceFingerprint>>,
}

impl ConfigStore {
    /// Load the initial snapshot from `path`. Failure here is fatal for startup.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let (config, fingerprint) = load_config(&path)?;
        Ok(Self {
            path: Some(path),
            current: ArcSwap::from_pointee(config),
            fingerprint: Mutex::new(Some(fingerprint)),
        })
    }

    /// A store with no backing file; `reload_if_changed` is always `Unchanged`.
    pub fn from_config(config: AppConfig) -> Self {
        Self {
            path: None,
            current: ArcSwap::from_pointee(config),
            fingerprint: Mutex::new(None),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The full current snapshot.
    pub fn snapshot(&self) -> Arc<AppConfig> {
        self.current.load_full()
    }

    /// The current hot fields, all taken from one snapshot.
    pub fn hot(&self) -> HotFields {
        self.current.load().hot_fields()
    }

    /// Re-read the backing source if it changed and apply its hot fields.
    ///
    /// On any failure the current snapshot stays in place and the error is
    /// returned to the caller.
    pub fn reload_if_changed(&self) -> Result<ReloadOutcome, ConfigError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(ReloadOutcome::Unchanged);
        };

        let mut last = self
            .fingerprint
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let observed = SourceFingerprint::of(path)?;
        if last.as_ref() == Some(&observed) {
            return Ok(ReloadOutcome::Unchanged);
        }

        let (incoming, fingerprint) = load_config(path)?;

        let previous = self.current.load_full();
        let next = previous.with_hot_fields_of(&incoming);
        let ignored = previous.restart_required_changes(&incoming);
        let outcome = ReloadOutcome::Applied {
            previous: previous.hot_fields(),
            current: next.hot_fields(),
            ignored,
        };

        self.current.store(Arc::new(next));
        *last = Some(fingerprint);
        Ok(outcome)
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("path", &self.path)
            .field("hot", &self.hot())
            .finish()
    }
}
