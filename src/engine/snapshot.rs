//! Point-in-time snapshots of the task collection
//!
//! A snapshot is the diffing unit: an immutable, timestamped copy of every
//! task, indexed by id. Capture is a structural clone of the store's map, not
//! a serialization round-trip, and a snapshot is never mutated once taken.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Task, TaskId, TaskKind, TaskStatus};

/// Immutable copy of the full task collection
#[derive(Debug, Clone)]
pub struct Snapshot {
    captured_at: DateTime<Utc>,
    tasks: HashMap<TaskId, Task>,
}

impl Snapshot {
    /// Wraps an already-cloned task map as a snapshot
    pub fn capture(tasks: HashMap<TaskId, Task>) -> Self {
        Self {
            captured_at: Utc::now(),
            tasks,
        }
    }

    /// An empty snapshot (the baseline before any tasks exist)
    pub fn empty() -> Self {
        Self::capture(HashMap::new())
    }

    /// When this snapshot was captured
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Returns a task by id
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Returns true if the snapshot contains the id
    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    /// Iterates over all task ids
    pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.keys()
    }

    /// Iterates over all tasks
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Returns the number of tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if the snapshot holds no tasks
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns a status-by-id map
    pub fn statuses(&self) -> HashMap<TaskId, TaskStatus> {
        self.tasks
            .iter()
            .map(|(id, task)| (id.clone(), task.status))
            .collect()
    }

    /// Counts tasks by kind
    pub fn totals(&self) -> TaskTotals {
        let mut totals = TaskTotals::default();
        for task in self.tasks.values() {
            match task.kind {
                TaskKind::Epic => totals.epics += 1,
                TaskKind::Task => totals.tasks += 1,
                TaskKind::Subtask => totals.subtasks += 1,
            }
        }
        totals
    }
}

/// Task counts by kind, for validation against externally-declared totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTotals {
    pub epics: usize,
    pub tasks: usize,
    pub subtasks: usize,
}

impl TaskTotals {
    /// Total task count across all kinds
    pub fn total(&self) -> usize {
        self.epics + self.tasks + self.subtasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskInput, TaskStore};

    #[test]
    fn empty_snapshot() {
        let snap = Snapshot::empty();
        assert!(snap.is_empty());
        assert_eq!(snap.totals().total(), 0);
    }

    #[test]
    fn totals_count_by_kind() {
        let mut store = TaskStore::new();
        store.create(TaskInput::new(TaskKind::Epic, "E")).unwrap();
        store.create(TaskInput::new(TaskKind::Task, "T1")).unwrap();
        store.create(TaskInput::new(TaskKind::Task, "T2")).unwrap();
        store.create(TaskInput::new(TaskKind::Subtask, "S")).unwrap();

        let totals = store.snapshot().totals();
        assert_eq!(totals.epics, 1);
        assert_eq!(totals.tasks, 2);
        assert_eq!(totals.subtasks, 1);
        assert_eq!(totals.total(), 4);
    }

    #[test]
    fn snapshot_lookup() {
        let mut store = TaskStore::new();
        let task = store.create(TaskInput::new(TaskKind::Task, "T")).unwrap();

        let snap = store.snapshot();
        assert!(snap.contains(&task.id));
        assert_eq!(snap.get(&task.id).unwrap().title, "T");
        assert_eq!(snap.len(), 1);
    }
}
