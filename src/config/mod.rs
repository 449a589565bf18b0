//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → store.rs (ArcSwap snapshot shared by all subsystems)
//!
//! Every reload interval:
//!     watcher.rs checks the file fingerprint
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → hot fields merged into a new snapshot, swapped atomically
//!     → readers see either the old or the new snapshot, never a mix
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; a reload replaces, never mutates
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only request timeout, body limit and log level are hot

pub mod loader;
pub mod schema;
pub mod store;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{AppConfig, HotFields, LogLevel, TimeoutPolicy};
pub use store::{ConfigStore, ReloadOutcome};
pub use watcher::ConfigReloader;
