//! Snapshot document storage
//!
//! The full task collection is persisted as one JSON document in
//! `.trellis/snapshot.json`: metadata with declared totals, one array per
//! hierarchy tier, and a denormalized dependency map. The map is derived
//! output regenerated from the task records on every save; loading trusts
//! the task records, never the map. Uses file locking for concurrent access
//! safety and temp-file-plus-rename for atomic writes.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::domain::{Task, TaskId, TaskKind, TaskStore};

const DOCUMENT_VERSION: u32 = 1;

/// Declared totals and provenance for a snapshot document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub total_tasks: usize,
    pub generated_at: DateTime<Utc>,
    pub version: u32,
}

/// Denormalized dependency edges for one task
///
/// Advisory mirror of the edges on the task records; `requires`/`blocked_by`
/// repeat the task's dependency list and `enables`/`blocks` the inverse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyInfo {
    pub requires: Vec<TaskId>,
    pub enables: Vec<TaskId>,
    pub blocks: Vec<TaskId>,
    pub blocked_by: Vec<TaskId>,
    #[serde(rename = "type")]
    pub dep_type: String,
    pub strength: String,
}

/// Persisted form of the full task collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub metadata: DocumentMetadata,
    pub epics: Vec<Task>,
    pub tasks: Vec<Task>,
    pub subtasks: Vec<Task>,
    #[serde(default)]
    pub dependencies: BTreeMap<TaskId, DependencyInfo>,
}

impl SnapshotDocument {
    /// Builds a document from a store, regenerating the dependency map
    pub fn from_store(store: &TaskStore) -> Self {
        let mut epics = Vec::new();
        let mut tasks = Vec::new();
        let mut subtasks = Vec::new();
        let mut dependencies = BTreeMap::new();

        for task in store.all() {
            if !task.dependencies.is_empty() || !task.enables.is_empty() {
                dependencies.insert(
                    task.id.clone(),
                    DependencyInfo {
                        requires: task.dependencies.clone(),
                        enables: task.enables.clone(),
                        blocks: task.enables.clone(),
                        blocked_by: task.blocked_by.clone(),
                        dep_type: "completion".to_string(),
                        strength: "hard".to_string(),
                    },
                );
            }

            match task.kind {
                TaskKind::Epic => epics.push(task.clone()),
                TaskKind::Task => tasks.push(task.clone()),
                TaskKind::Subtask => subtasks.push(task.clone()),
            }
        }

        let total_tasks = epics.len() + tasks.len() + subtasks.len();
        Self {
            metadata: DocumentMetadata {
                total_tasks,
                generated_at: Utc::now(),
                version: DOCUMENT_VERSION,
            },
            epics,
            tasks,
            subtasks,
            dependencies,
        }
    }

    /// Rebuilds a store from the task records (the dependency map is ignored)
    pub fn into_store(self) -> TaskStore {
        TaskStore::from_tasks(
            self.epics
                .into_iter()
                .chain(self.tasks)
                .chain(self.subtasks),
        )
    }

    /// Actual task count across the three arrays
    pub fn task_count(&self) -> usize {
        self.epics.len() + self.tasks.len() + self.subtasks.len()
    }

    /// Returns true if the declared total matches the arrays
    pub fn totals_consistent(&self) -> bool {
        self.metadata.total_tasks == self.task_count()
    }
}

/// Reads and writes the snapshot document
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Creates a store at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path to the document file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if a document has been written
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the document, or None if none has been written yet
    pub fn load(&self) -> Result<Option<SnapshotDocument>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open snapshot: {}", self.path.display()))?;

        file.lock_shared()
            .context("Failed to acquire read lock on snapshot")?;

        let reader = BufReader::new(&file);
        let document: SnapshotDocument = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse snapshot: {}", self.path.display()))?;

        // lock is released when file is dropped
        Ok(Some(document))
    }

    /// Loads the document and rebuilds a store (empty if no document)
    pub fn load_store(&self) -> Result<TaskStore> {
        Ok(self
            .load()?
            .map(SnapshotDocument::into_store)
            .unwrap_or_default())
    }

    /// Writes the store's current state as the new document (full rewrite)
    pub fn save(&self, store: &TaskStore) -> Result<()> {
        let document = SnapshotDocument::from_store(store);
        self.save_document(&document)
    }

    /// Writes a document atomically (temp file + rename)
    pub fn save_document(&self, document: &SnapshotDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let temp_path = self.path.with_extension("json.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            file.lock_exclusive()
                .context("Failed to acquire write lock on snapshot")?;

            let mut writer = BufWriter::new(&file);
            serde_json::to_writer_pretty(&mut writer, document)
                .context("Failed to serialize snapshot")?;
            writer.flush().context("Failed to flush snapshot")?;
        }

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskInput, TaskPatch, TaskStatus};
    use tempfile::TempDir;

    fn populated_store() -> TaskStore {
        let mut store = TaskStore::new();
        let epic = store.create(TaskInput::new(TaskKind::Epic, "Epic")).unwrap();

        let mut input = TaskInput::new(TaskKind::Task, "Task");
        input.parent = Some(epic.id.clone());
        let task = store.create(input).unwrap();

        let mut input = TaskInput::new(TaskKind::Subtask, "Subtask");
        input.parent = Some(task.id.clone());
        input.dependencies = vec![task.id.clone()];
        store.create(input).unwrap();

        store
    }

    #[test]
    fn document_splits_tasks_by_kind() {
        let store = populated_store();
        let document = SnapshotDocument::from_store(&store);

        assert_eq!(document.epics.len(), 1);
        assert_eq!(document.tasks.len(), 1);
        assert_eq!(document.subtasks.len(), 1);
        assert_eq!(document.metadata.total_tasks, 3);
        assert!(document.totals_consistent());
    }

    #[test]
    fn dependency_map_is_regenerated_from_task_records() {
        let store = populated_store();
        let document = SnapshotDocument::from_store(&store);

        // the task enables the subtask; the subtask requires the task
        assert_eq!(document.dependencies.len(), 2);
        let subtask_id = &document.subtasks[0].id;
        let info = document.dependencies.get(subtask_id).unwrap();
        assert_eq!(info.requires, document.subtasks[0].dependencies);
        assert_eq!(info.blocked_by, info.requires);
    }

    #[test]
    fn stale_dependency_map_is_ignored_on_load() {
        let store = populated_store();
        let mut document = SnapshotDocument::from_store(&store);
        // corrupt the advisory map; the rebuilt store must not care
        document.dependencies.clear();

        let rebuilt = document.into_store();
        let subtask = rebuilt
            .all()
            .into_iter()
            .find(|t| t.kind == TaskKind::Subtask)
            .unwrap();
        assert_eq!(subtask.dependencies.len(), 1);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store_path = dir.path().join("snapshot.json");
        let snapshot_store = SnapshotStore::new(&store_path);

        let mut store = populated_store();
        let id = store.all()[0].id.clone();
        store
            .update(&id, TaskPatch::status(TaskStatus::Completed))
            .unwrap();
        snapshot_store.save(&store).unwrap();

        let loaded = snapshot_store.load_store().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.get(&id).unwrap().status, TaskStatus::Completed);
        assert_eq!(loaded.get(&id).unwrap().progress, 100);
    }

    #[test]
    fn load_missing_document_yields_empty_store() {
        let dir = TempDir::new().unwrap();
        let snapshot_store = SnapshotStore::new(dir.path().join("snapshot.json"));

        assert!(snapshot_store.load().unwrap().is_none());
        assert!(snapshot_store.load_store().unwrap().is_empty());
    }

    #[test]
    fn totals_mismatch_is_detectable() {
        let store = populated_store();
        let mut document = SnapshotDocument::from_store(&store);
        document.metadata.total_tasks = 99;

        assert!(!document.totals_consistent());
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store_path = dir.path().join("snapshot.json");
        SnapshotStore::new(&store_path).save(&populated_store()).unwrap();

        assert!(store_path.exists());
        assert!(!store_path.with_extension("json.tmp").exists());
    }
}
