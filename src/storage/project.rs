//! Project management
//!
//! Handles project initialization and provides access to the snapshot
//! document, event log and analytics stores under `.trellis/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use thiserror::Error;

use super::{AnalyticsStore, Config, EventLog, SnapshotStore};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a trellis project. Run 'trellis init' first.")]
    NotInProject,
}

/// A Trellis project
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let trellis_dir = root.join(".trellis");

        if !trellis_dir.is_dir() {
            return Err(ProjectError::NotInProject.into());
        }

        let config = Config::for_project(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a new project at the given path
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let trellis_dir = root.join(".trellis");

        fs::create_dir_all(&trellis_dir).with_context(|| {
            format!(
                "Failed to create .trellis directory: {}",
                trellis_dir.display()
            )
        })?;

        let config_path = trellis_dir.join("config.toml");
        if !config_path.exists() {
            let default_config = r#"# Trellis CLI configuration

# What to do with tasks whose dependencies just completed:
# "announce" records the event, "auto_start" also moves them to in_progress
enablement = "announce"

# Prefix for session ids in the event log
session_prefix = "session"

# Write events to .trellis/events.jsonl
event_log_enabled = true
"#;
            fs::write(&config_path, default_config)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = trellis_dir.join(".gitignore");
        if !gitignore_path.exists() {
            let gitignore = r#"# Event history and analytics are derived data
events.jsonl
analytics.json

# In-flight snapshot writes
*.tmp
"#;
            fs::write(&gitignore_path, gitignore).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        Self::open(root)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .trellis directory path
    pub fn trellis_dir(&self) -> PathBuf {
        self.root.join(".trellis")
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a mutable reference to the configuration
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Returns the snapshot document store
    pub fn snapshot_store(&self) -> SnapshotStore {
        SnapshotStore::new(self.trellis_dir().join("snapshot.json"))
    }

    /// Returns the event log with a freshly generated session id
    pub fn event_log(&self) -> EventLog {
        let session_id = format!(
            "{}-{}",
            self.config.project.session_prefix,
            Utc::now().format("%Y%m%dT%H%M%S%3f")
        );
        EventLog::new(self.trellis_dir().join("events.jsonl"), session_id)
    }

    /// Returns the analytics store
    pub fn analytics_store(&self) -> AnalyticsStore {
        AnalyticsStore::new(self.trellis_dir().join("analytics.json"))
    }

    /// Checks if a path is inside this project
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_creates_structure() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();

        assert!(project.trellis_dir().is_dir());
        assert!(project.trellis_dir().join("config.toml").is_file());
        assert!(project.trellis_dir().join(".gitignore").is_file());
    }

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();

        Project::init(dir.path()).unwrap();
        Project::init(dir.path()).unwrap();

        assert!(dir.path().join(".trellis").is_dir());
    }

    #[test]
    fn open_existing_project() {
        let dir = TempDir::new().unwrap();
        Project::init(dir.path()).unwrap();

        let project = Project::open(dir.path()).unwrap();
        assert_eq!(project.root(), dir.path());
    }

    #[test]
    fn open_non_project_fails() {
        let dir = TempDir::new().unwrap();
        let result = Project::open(dir.path());

        assert!(result.is_err());
    }

    #[test]
    fn stores_are_accessible() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();

        assert!(project.snapshot_store().path().ends_with("snapshot.json"));
        assert!(project.event_log().path().ends_with("events.jsonl"));
        assert!(project
            .analytics_store()
            .path()
            .ends_with("analytics.json"));
    }

    #[test]
    fn session_id_uses_configured_prefix() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();

        assert!(project.event_log().session_id().starts_with("session-"));
    }

    #[test]
    fn default_config_parses() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();

        assert!(!project.config().project.auto_start_enabled());
        assert!(project.config().project.event_log_enabled);
    }
}
