//! Task domain model
//!
//! Tasks form a three-tier hierarchy (epic, task, subtask) differentiated by
//! `kind`, not by structural capability. Any task can carry children and
//! dependencies on other tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::id::TaskId;

/// Hierarchy tier of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Epic,
    #[default]
    Task,
    Subtask,
}

impl TaskKind {
    /// Returns a display label for the kind
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Epic => "epic",
            TaskKind::Task => "task",
            TaskKind::Subtask => "subtask",
        }
    }
}

/// Status of a task
///
/// State machine:
/// - initial: `Pending`
/// - `Pending -> InProgress` on explicit start or progress > 0
/// - `InProgress -> Completed` on explicit completion or progress reaching 100
/// - any non-terminal state -> `Cancelled` (explicit only)
/// - `Completed` and `Cancelled` are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Blocked,
    Completed,
    Cancelled,
    OnHold,
}

impl TaskStatus {
    /// Returns true if this status represents completion
    pub fn is_complete(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    /// Returns true if this task is not yet started
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskStatus::Pending)
    }

    /// Returns true if this task is currently being worked on
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::InProgress)
    }

    /// Returns true if no further transitions are allowed from this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    /// Returns a display label for the status
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::OnHold => "on_hold",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Priority of a task (descriptive, diffed but no engine semantics)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Returns a display label for the priority
    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

/// Metadata for a task - extensible key-value pairs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMeta(HashMap<String, serde_json::Value>);

impl TaskMeta {
    /// Creates empty metadata
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Gets a value by key
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Sets a value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Removes a value
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.0.remove(key)
    }

    /// Returns true if empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all key-value pairs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

/// A work item in the hierarchy
///
/// Hierarchy edges (`parent`/`children`) and dependency edges
/// (`dependencies`/`enables`) are maintained in lockstep by
/// [`TaskStore`](super::store::TaskStore); callers must not mutate the edge
/// lists directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier, immutable after creation
    pub id: TaskId,

    /// Hierarchy tier (epic, task, subtask)
    pub kind: TaskKind,

    /// Depth hint in the hierarchy (informational; `parent` is authoritative)
    #[serde(default)]
    pub level: u32,

    /// Human-readable title
    pub title: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Current status
    pub status: TaskStatus,

    /// Priority
    #[serde(default)]
    pub priority: Priority,

    /// Completion percentage, 0-100
    #[serde(default)]
    pub progress: u8,

    /// Estimated effort in hours
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,

    /// Actual effort in hours
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<f64>,

    /// Containing task, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<TaskId>,

    /// Tasks whose `parent` is this task, in insertion order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TaskId>,

    /// Tasks that must complete before this one is unblocked
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<TaskId>,

    /// Mirror of `dependencies`, kept in lockstep (preserved for document
    /// compatibility; readers may use either list)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<TaskId>,

    /// Tasks that list this one as a dependency (inverse edge)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enables: Vec<TaskId>,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last updated
    pub updated_at: DateTime<Utc>,

    /// When the task was completed (set only on transition into Completed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Free-form tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Assigned person or agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    /// Due date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,

    /// Extensible metadata
    #[serde(default, skip_serializing_if = "TaskMeta::is_empty")]
    pub meta: TaskMeta,
}

impl Task {
    /// Creates a new task with the given kind and title
    pub fn new(kind: TaskKind, title: impl Into<String>) -> Self {
        let title = title.into();
        let now = Utc::now();
        Self {
            id: TaskId::new(kind, &title, now),
            kind,
            level: 0,
            title,
            description: None,
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            progress: 0,
            estimated_hours: None,
            actual_hours: None,
            parent: None,
            children: Vec::new(),
            dependencies: Vec::new(),
            blocked_by: Vec::new(),
            enables: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            tags: Vec::new(),
            assignee: None,
            due_date: None,
            meta: TaskMeta::new(),
        }
    }

    /// Transitions to in_progress status
    pub fn start(&mut self) {
        if matches!(self.status, TaskStatus::Pending | TaskStatus::Blocked | TaskStatus::OnHold) {
            self.status = TaskStatus::InProgress;
            self.touch();
        }
    }

    /// Transitions to completed status, forcing progress to 100
    pub fn complete(&mut self) {
        if !self.status.is_terminal() {
            self.status = TaskStatus::Completed;
            self.progress = 100;
            let now = Utc::now();
            self.updated_at = now;
            self.completed_at = Some(now);
        }
    }

    /// Transitions to cancelled status
    pub fn cancel(&mut self) {
        if !self.status.is_terminal() {
            self.status = TaskStatus::Cancelled;
            self.touch();
        }
    }

    /// Puts the task on hold
    pub fn hold(&mut self) {
        if !self.status.is_terminal() {
            self.status = TaskStatus::OnHold;
            self.touch();
        }
    }

    /// Sets progress, applying the implied status transitions:
    /// progress > 0 starts a pending task, progress == 100 completes it.
    /// Lowering progress is allowed (monotonicity is not enforced).
    /// Ignored once the task is in a terminal status.
    pub fn set_progress(&mut self, progress: u8) {
        if self.status.is_terminal() {
            return;
        }
        let progress = progress.min(100);
        self.progress = progress;
        if progress == 100 {
            self.complete();
            return;
        }
        if progress > 0 && self.status.is_pending() {
            self.status = TaskStatus::InProgress;
        }
        self.touch();
    }

    /// Returns true if every dependency is complete in the given status map
    /// (a completed task is never "ready")
    pub fn is_ready(&self, statuses: &HashMap<TaskId, TaskStatus>) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        self.dependencies.iter().all(|dep_id| {
            statuses
                .get(dep_id)
                .map(|s| s.is_complete())
                .unwrap_or(false)
        })
    }

    /// Returns true if at least one dependency is incomplete
    pub fn is_blocked(&self, statuses: &HashMap<TaskId, TaskStatus>) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        self.dependencies.iter().any(|dep_id| {
            statuses
                .get(dep_id)
                .map(|s| !s.is_complete())
                .unwrap_or(true) // unknown dependency = blocked
        })
    }

    /// Refreshes the updated_at timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
