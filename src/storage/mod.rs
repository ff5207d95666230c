//! # Storage Layer
//!
//! Persistence layer for Trellis CLI with git-friendly file formats.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Snapshot document | JSON (tiered arrays + metadata) | `.trellis/snapshot.json` |
//! | Event log | NDJSON (one event per line) | `.trellis/events.jsonl` |
//! | Analytics | JSON summary | `.trellis/analytics.json` |
//! | Config | TOML | `.trellis/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`SnapshotStore`] and [`EventLog`] use file locking (`fs2`)
//! - Snapshot writes are atomic (temp file + rename)
//! - The event log is append-only; the analytics file is a full rewrite
//!
//! ## Project Structure
//!
//! ```text
//! .trellis/
//! ├── snapshot.json         # Full task collection, one document
//! ├── events.jsonl          # Append-only monitoring event history
//! ├── analytics.json        # Running counters (regenerated)
//! ├── config.toml           # Project configuration
//! └── .gitignore            # Ignores derived files
//! ```
//!
//! ## Key Types
//!
//! - [`Project`] - Entry point for accessing a Trellis project
//! - [`SnapshotStore`] - Read/write the snapshot document
//! - [`EventLog`] / [`AnalyticsStore`] - Monitoring sinks
//! - [`Config`] - Project and global configuration

mod config;
mod document;
mod project;
mod sinks;

pub use config::{Config, ConfigError, EnablementPolicy, GlobalConfig, OutputFormat, ProjectConfig};
pub use document::{DependencyInfo, DocumentMetadata, SnapshotDocument, SnapshotStore};
pub use project::{Project, ProjectError};
pub use sinks::{AnalyticsDocument, AnalyticsStore, EventLog, LoggedEvent};
