//! Canonical task store
//!
//! Owns the task collection by id and enforces the structural invariants:
//! parent/children consistency, dependencies/enables symmetry, and the
//! `blocked_by` lockstep mirror. All edge updates go through store methods;
//! callers never mutate the edge lists directly.
//!
//! Mutations are serialized by `&mut self` ownership. Wrap the store in a
//! `Mutex` when sharing across threads; `snapshot()` then captures a
//! consistent copy under the same lock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::graph::DependencyGraph;
use super::id::TaskId;
use super::task::{Priority, Task, TaskKind, TaskStatus};
use crate::engine::Snapshot;

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Reparenting {task} under {parent} would create a cycle")]
    Cycle { task: TaskId, parent: TaskId },

    #[error("Dependency cycle: {task} -> {dependency}")]
    DependencyCycle { task: TaskId, dependency: TaskId },

    #[error("Illegal status transition for {id}: {from} -> {to}")]
    IllegalTransition {
        id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
}

/// Input for creating a task
#[derive(Debug, Clone, Default)]
pub struct TaskInput {
    pub kind: TaskKind,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub parent: Option<TaskId>,
    pub dependencies: Vec<TaskId>,
    pub estimated_hours: Option<f64>,
    pub tags: Vec<String>,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskInput {
    /// Creates an input with the given kind and title, everything else default
    pub fn new(kind: TaskKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update for a task; `None` fields are left unchanged
///
/// `parent` uses a nested Option: `Some(None)` detaches the task from its
/// parent, `Some(Some(id))` reparents it. `dependencies` is a full
/// replacement of the dependency list.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub progress: Option<u8>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub parent: Option<Option<TaskId>>,
    pub dependencies: Option<Vec<TaskId>>,
    pub tags: Option<Vec<String>>,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskPatch {
    /// A patch that only changes status
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// A patch that only changes progress
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }
}

/// The canonical collection of tasks
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: HashMap<TaskId, Task>,
}

impl TaskStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    /// Builds a store from existing task records (e.g. a loaded document),
    /// trusting their edge lists as already consistent
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            tasks: tasks.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }

    /// Creates a task, wiring parent and dependency edges
    pub fn create(&mut self, input: TaskInput) -> Result<Task, StoreError> {
        if let Some(parent_id) = &input.parent {
            if !self.tasks.contains_key(parent_id) {
                return Err(StoreError::NotFound(parent_id.clone()));
            }
        }
        for dep_id in &input.dependencies {
            if !self.tasks.contains_key(dep_id) {
                return Err(StoreError::NotFound(dep_id.clone()));
            }
        }

        let mut task = Task::new(input.kind, input.title);
        // hash IDs are timestamp-derived; regenerate on the rare collision
        while self.tasks.contains_key(&task.id) {
            task = Task::new(task.kind, task.title);
        }

        task.description = input.description;
        task.priority = input.priority;
        task.estimated_hours = input.estimated_hours;
        task.tags = input.tags;
        task.assignee = input.assignee;
        task.due_date = input.due_date;
        task.dependencies = input.dependencies.clone();
        task.blocked_by = input.dependencies.clone();

        if let Some(parent_id) = input.parent {
            let parent = self
                .tasks
                .get_mut(&parent_id)
                .ok_or_else(|| StoreError::NotFound(parent_id.clone()))?;
            parent.children.push(task.id.clone());
            parent.touch();
            task.level = parent.level + 1;
            task.parent = Some(parent_id);
        }

        for dep_id in &input.dependencies {
            if let Some(dep) = self.tasks.get_mut(dep_id) {
                dep.enables.push(task.id.clone());
            }
        }

        self.tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    /// Applies a patch to a task, validating transition legality and
    /// maintaining inverse edges
    pub fn update(&mut self, id: &TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
        let current = self
            .tasks
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?
            .clone();

        // Reject leaving a terminal status before touching anything
        if let Some(new_status) = patch.status {
            if current.status.is_terminal() && new_status != current.status {
                return Err(StoreError::IllegalTransition {
                    id: id.clone(),
                    from: current.status,
                    to: new_status,
                });
            }
        }

        if let Some(new_parent) = &patch.parent {
            self.validate_reparent(id, new_parent.as_ref())?;
        }

        if let Some(new_deps) = &patch.dependencies {
            self.validate_dependencies(id, new_deps)?;
        }

        // All validation passed; apply edge rewires first, then fields.
        if let Some(new_parent) = patch.parent.clone() {
            self.apply_reparent(id, new_parent);
        }

        if let Some(new_deps) = patch.dependencies.clone() {
            self.apply_dependencies(id, new_deps);
        }

        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = Some(description);
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(estimated) = patch.estimated_hours {
            task.estimated_hours = Some(estimated);
        }
        if let Some(actual) = patch.actual_hours {
            task.actual_hours = Some(actual);
        }
        if let Some(tags) = patch.tags {
            task.tags = tags;
        }
        if let Some(assignee) = patch.assignee {
            task.assignee = Some(assignee);
        }
        if let Some(due) = patch.due_date {
            task.due_date = Some(due);
        }

        if let Some(progress) = patch.progress {
            task.set_progress(progress);
        }

        if let Some(status) = patch.status {
            if status != task.status {
                match status {
                    TaskStatus::Completed => task.complete(),
                    TaskStatus::InProgress => task.start(),
                    TaskStatus::Cancelled => task.cancel(),
                    other => {
                        task.status = other;
                    }
                }
            }
        }

        task.touch();
        Ok(task.clone())
    }

    /// Removes a task, stripping its id from every other task's edge lists
    pub fn remove(&mut self, id: &TaskId) -> Result<Task, StoreError> {
        let removed = self
            .tasks
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        for task in self.tasks.values_mut() {
            task.children.retain(|c| c != id);
            task.dependencies.retain(|d| d != id);
            task.blocked_by.retain(|b| b != id);
            task.enables.retain(|e| e != id);
            // orphaned children keep their records but lose the edge
            if task.parent.as_ref() == Some(id) {
                task.parent = None;
            }
        }

        Ok(removed)
    }

    /// Returns a task by id
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Returns all tasks, sorted by id for deterministic output
    pub fn all(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }

    /// Returns the number of tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if the store holds no tasks
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Captures a deep, independent copy of the collection for diffing
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(self.tasks.clone())
    }

    /// Returns a status-by-id map for graph queries
    pub fn statuses(&self) -> HashMap<TaskId, TaskStatus> {
        self.tasks
            .iter()
            .map(|(id, task)| (id.clone(), task.status))
            .collect()
    }

    /// Builds the dependency graph over the current collection
    pub fn dependency_graph(&self) -> DependencyGraph {
        // edges were validated on insert, so this cannot fail
        DependencyGraph::from_tasks(self.tasks.values()).unwrap_or_default()
    }

    /// Rejects a reparent that would make `id` an ancestor of itself.
    /// Walks the parent chain upward from the proposed parent.
    fn validate_reparent(&self, id: &TaskId, new_parent: Option<&TaskId>) -> Result<(), StoreError> {
        let parent_id = match new_parent {
            Some(p) => p,
            None => return Ok(()), // detaching is always legal
        };

        if !self.tasks.contains_key(parent_id) {
            return Err(StoreError::NotFound(parent_id.clone()));
        }

        let mut cursor = Some(parent_id.clone());
        while let Some(current) = cursor {
            if &current == id {
                return Err(StoreError::Cycle {
                    task: id.clone(),
                    parent: parent_id.clone(),
                });
            }
            cursor = self.tasks.get(&current).and_then(|t| t.parent.clone());
        }

        Ok(())
    }

    fn apply_reparent(&mut self, id: &TaskId, new_parent: Option<TaskId>) {
        let old_parent = self.tasks.get(id).and_then(|t| t.parent.clone());
        if old_parent == new_parent {
            return;
        }

        if let Some(old_id) = old_parent {
            if let Some(old) = self.tasks.get_mut(&old_id) {
                old.children.retain(|c| c != id);
                old.touch();
            }
        }

        let new_level = match &new_parent {
            Some(parent_id) => {
                let parent = self.tasks.get_mut(parent_id);
                match parent {
                    Some(p) => {
                        p.children.push(id.clone());
                        p.touch();
                        p.level + 1
                    }
                    None => 0,
                }
            }
            None => 0,
        };

        if let Some(task) = self.tasks.get_mut(id) {
            task.parent = new_parent;
            task.level = new_level;
        }
    }

    /// Rejects a dependency list referencing missing tasks or closing a cycle
    fn validate_dependencies(&self, id: &TaskId, new_deps: &[TaskId]) -> Result<(), StoreError> {
        for dep_id in new_deps {
            if !self.tasks.contains_key(dep_id) {
                return Err(StoreError::NotFound(dep_id.clone()));
            }
        }

        // Rebuild the graph with this task's edges replaced and let petgraph
        // find any cycle the new list would close.
        let mut graph = DependencyGraph::new();
        for task_id in self.tasks.keys() {
            graph.add_task(task_id.clone());
        }
        for task in self.tasks.values() {
            if &task.id == id {
                continue;
            }
            for dep_id in &task.dependencies {
                // pre-existing edges are known acyclic
                let _ = graph.add_dependency(&task.id, dep_id);
            }
        }
        for dep_id in new_deps {
            graph
                .add_dependency(id, dep_id)
                .map_err(|_| StoreError::DependencyCycle {
                    task: id.clone(),
                    dependency: dep_id.clone(),
                })?;
        }

        Ok(())
    }

    fn apply_dependencies(&mut self, id: &TaskId, new_deps: Vec<TaskId>) {
        let old_deps = self
            .tasks
            .get(id)
            .map(|t| t.dependencies.clone())
            .unwrap_or_default();

        for dep_id in &old_deps {
            if !new_deps.contains(dep_id) {
                if let Some(dep) = self.tasks.get_mut(dep_id) {
                    dep.enables.retain(|e| e != id);
                }
            }
        }
        for dep_id in &new_deps {
            if !old_deps.contains(dep_id) {
                if let Some(dep) = self.tasks.get_mut(dep_id) {
                    dep.enables.push(id.clone());
                }
            }
        }

        if let Some(task) = self.tasks.get_mut(id) {
            task.dependencies = new_deps.clone();
            task.blocked_by = new_deps;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(store: &mut TaskStore, title: &str) -> Task {
        store.create(TaskInput::new(TaskKind::Task, title)).unwrap()
    }

    #[test]
    fn create_assigns_unique_ids_and_defaults() {
        let mut store = TaskStore::new();
        let a = create(&mut store, "A");
        let b = create(&mut store, "B");

        assert_ne!(a.id, b.id);
        assert_eq!(a.status, TaskStatus::Pending);
        assert_eq!(a.priority, Priority::Medium);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn create_with_parent_wires_children() {
        let mut store = TaskStore::new();
        let epic = store.create(TaskInput::new(TaskKind::Epic, "Epic")).unwrap();

        let mut input = TaskInput::new(TaskKind::Task, "Child");
        input.parent = Some(epic.id.clone());
        let child = store.create(input).unwrap();

        let epic = store.get(&epic.id).unwrap();
        assert!(epic.children.contains(&child.id));
        assert_eq!(child.parent, Some(epic.id.clone()));
        assert_eq!(child.level, 1);
    }

    #[test]
    fn create_with_missing_parent_fails() {
        let mut store = TaskStore::new();
        let ghost: TaskId = "t-1234567".parse().unwrap();

        let mut input = TaskInput::new(TaskKind::Task, "Orphan");
        input.parent = Some(ghost.clone());

        assert_eq!(store.create(input), Err(StoreError::NotFound(ghost)));
    }

    #[test]
    fn create_with_dependencies_wires_enables_and_blocked_by() {
        let mut store = TaskStore::new();
        let a = create(&mut store, "A");

        let mut input = TaskInput::new(TaskKind::Task, "B");
        input.dependencies = vec![a.id.clone()];
        let b = store.create(input).unwrap();

        assert_eq!(b.dependencies, vec![a.id.clone()]);
        assert_eq!(b.blocked_by, vec![a.id.clone()]);
        assert_eq!(store.get(&a.id).unwrap().enables, vec![b.id.clone()]);
    }

    #[test]
    fn update_unknown_task_fails() {
        let mut store = TaskStore::new();
        let ghost: TaskId = "t-1234567".parse().unwrap();

        let result = store.update(&ghost, TaskPatch::status(TaskStatus::InProgress));
        assert_eq!(result, Err(StoreError::NotFound(ghost)));
    }

    #[test]
    fn completing_forces_progress_and_stamps_completed_at() {
        let mut store = TaskStore::new();
        let a = create(&mut store, "A");

        let updated = store
            .update(&a.id, TaskPatch::status(TaskStatus::Completed))
            .unwrap();

        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.progress, 100);
        assert!(updated.completed_at.is_some());
    }

    #[test]
    fn progress_patch_on_completed_task_keeps_progress_at_100() {
        let mut store = TaskStore::new();
        let a = create(&mut store, "A");
        store
            .update(&a.id, TaskPatch::status(TaskStatus::Completed))
            .unwrap();

        let updated = store.update(&a.id, TaskPatch::progress(50)).unwrap();

        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.progress, 100);
    }

    #[test]
    fn reopening_terminal_task_is_rejected() {
        let mut store = TaskStore::new();
        let a = create(&mut store, "A");
        store
            .update(&a.id, TaskPatch::status(TaskStatus::Cancelled))
            .unwrap();

        let result = store.update(&a.id, TaskPatch::status(TaskStatus::Pending));
        assert!(matches!(
            result,
            Err(StoreError::IllegalTransition {
                from: TaskStatus::Cancelled,
                to: TaskStatus::Pending,
                ..
            })
        ));
    }

    #[test]
    fn identical_status_patch_is_idempotent() {
        let mut store = TaskStore::new();
        let a = create(&mut store, "A");
        store
            .update(&a.id, TaskPatch::status(TaskStatus::Completed))
            .unwrap();
        let first = store.get(&a.id).unwrap().clone();

        // re-applying the same terminal status is a no-op, not an error
        store
            .update(&a.id, TaskPatch::status(TaskStatus::Completed))
            .unwrap();
        let second = store.get(&a.id).unwrap();

        assert_eq!(first.status, second.status);
        assert_eq!(first.completed_at, second.completed_at);
        assert_eq!(first.progress, second.progress);
    }

    #[test]
    fn progress_patch_drives_status() {
        let mut store = TaskStore::new();
        let a = create(&mut store, "A");

        let updated = store.update(&a.id, TaskPatch::progress(50)).unwrap();
        assert_eq!(updated.status, TaskStatus::InProgress);

        let updated = store.update(&a.id, TaskPatch::progress(100)).unwrap();
        assert_eq!(updated.status, TaskStatus::Completed);
        assert!(updated.completed_at.is_some());
    }

    #[test]
    fn reparent_moves_child_between_parents() {
        let mut store = TaskStore::new();
        let p1 = store.create(TaskInput::new(TaskKind::Epic, "P1")).unwrap();
        let p2 = store.create(TaskInput::new(TaskKind::Epic, "P2")).unwrap();

        let mut input = TaskInput::new(TaskKind::Task, "Child");
        input.parent = Some(p1.id.clone());
        let child = store.create(input).unwrap();

        let patch = TaskPatch {
            parent: Some(Some(p2.id.clone())),
            ..TaskPatch::default()
        };
        let updated = store.update(&child.id, patch).unwrap();

        assert_eq!(updated.parent, Some(p2.id.clone()));
        assert!(!store.get(&p1.id).unwrap().children.contains(&child.id));
        assert!(store.get(&p2.id).unwrap().children.contains(&child.id));
    }

    #[test]
    fn reparent_under_descendant_is_rejected() {
        let mut store = TaskStore::new();
        let top = store.create(TaskInput::new(TaskKind::Epic, "Top")).unwrap();

        let mut input = TaskInput::new(TaskKind::Task, "Mid");
        input.parent = Some(top.id.clone());
        let mid = store.create(input).unwrap();

        let mut input = TaskInput::new(TaskKind::Subtask, "Leaf");
        input.parent = Some(mid.id.clone());
        let leaf = store.create(input).unwrap();

        // moving Top under Leaf would close a hierarchy loop
        let patch = TaskPatch {
            parent: Some(Some(leaf.id.clone())),
            ..TaskPatch::default()
        };
        let result = store.update(&top.id, patch);

        assert!(matches!(result, Err(StoreError::Cycle { .. })));
        // nothing was half-applied
        assert!(store.get(&top.id).unwrap().parent.is_none());
        assert_eq!(store.get(&leaf.id).unwrap().children, Vec::<TaskId>::new());
    }

    #[test]
    fn detaching_parent_resets_level() {
        let mut store = TaskStore::new();
        let epic = store.create(TaskInput::new(TaskKind::Epic, "Epic")).unwrap();

        let mut input = TaskInput::new(TaskKind::Task, "Child");
        input.parent = Some(epic.id.clone());
        let child = store.create(input).unwrap();

        let patch = TaskPatch {
            parent: Some(None),
            ..TaskPatch::default()
        };
        let updated = store.update(&child.id, patch).unwrap();

        assert!(updated.parent.is_none());
        assert_eq!(updated.level, 0);
        assert!(!store.get(&epic.id).unwrap().children.contains(&child.id));
    }

    #[test]
    fn dependency_update_rewires_enables() {
        let mut store = TaskStore::new();
        let a = create(&mut store, "A");
        let b = create(&mut store, "B");
        let c = create(&mut store, "C");

        let patch = TaskPatch {
            dependencies: Some(vec![a.id.clone()]),
            ..TaskPatch::default()
        };
        store.update(&c.id, patch).unwrap();
        assert_eq!(store.get(&a.id).unwrap().enables, vec![c.id.clone()]);

        // swap the dependency from A to B
        let patch = TaskPatch {
            dependencies: Some(vec![b.id.clone()]),
            ..TaskPatch::default()
        };
        store.update(&c.id, patch).unwrap();

        assert!(store.get(&a.id).unwrap().enables.is_empty());
        assert_eq!(store.get(&b.id).unwrap().enables, vec![c.id.clone()]);
        assert_eq!(store.get(&c.id).unwrap().blocked_by, vec![b.id.clone()]);
    }

    #[test]
    fn dependency_cycle_is_rejected() {
        let mut store = TaskStore::new();
        let a = create(&mut store, "A");
        let b = create(&mut store, "B");

        let patch = TaskPatch {
            dependencies: Some(vec![a.id.clone()]),
            ..TaskPatch::default()
        };
        store.update(&b.id, patch).unwrap();

        let patch = TaskPatch {
            dependencies: Some(vec![b.id.clone()]),
            ..TaskPatch::default()
        };
        let result = store.update(&a.id, patch);

        assert!(matches!(result, Err(StoreError::DependencyCycle { .. })));
        assert!(store.get(&a.id).unwrap().dependencies.is_empty());
    }

    #[test]
    fn dependency_on_missing_task_is_rejected() {
        let mut store = TaskStore::new();
        let a = create(&mut store, "A");
        let ghost: TaskId = "t-1234567".parse().unwrap();

        let patch = TaskPatch {
            dependencies: Some(vec![ghost.clone()]),
            ..TaskPatch::default()
        };
        assert_eq!(store.update(&a.id, patch), Err(StoreError::NotFound(ghost)));
    }

    #[test]
    fn remove_strips_every_inverse_reference() {
        let mut store = TaskStore::new();
        let epic = store.create(TaskInput::new(TaskKind::Epic, "Epic")).unwrap();

        let mut input = TaskInput::new(TaskKind::Task, "Child");
        input.parent = Some(epic.id.clone());
        let child = store.create(input).unwrap();

        let mut input = TaskInput::new(TaskKind::Task, "Dependent");
        input.dependencies = vec![child.id.clone()];
        let dependent = store.create(input).unwrap();

        store.remove(&child.id).unwrap();

        assert!(store.get(&child.id).is_none());
        assert!(!store.get(&epic.id).unwrap().children.contains(&child.id));
        let dependent = store.get(&dependent.id).unwrap();
        assert!(dependent.dependencies.is_empty());
        assert!(dependent.blocked_by.is_empty());
    }

    #[test]
    fn remove_unknown_task_fails() {
        let mut store = TaskStore::new();
        let ghost: TaskId = "t-1234567".parse().unwrap();

        assert_eq!(store.remove(&ghost), Err(StoreError::NotFound(ghost)));
    }

    #[test]
    fn snapshot_is_independent_of_later_mutation() {
        let mut store = TaskStore::new();
        let a = create(&mut store, "A");

        let before = store.snapshot();
        store
            .update(&a.id, TaskPatch::status(TaskStatus::Completed))
            .unwrap();

        assert_eq!(before.get(&a.id).unwrap().status, TaskStatus::Pending);
        assert_eq!(store.get(&a.id).unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn all_is_sorted_by_id() {
        let mut store = TaskStore::new();
        create(&mut store, "one");
        create(&mut store, "two");
        create(&mut store, "three");

        let all = store.all();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].id <= w[1].id));
    }
}
