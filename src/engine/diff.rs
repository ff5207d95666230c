//! Snapshot differ
//!
//! Classifies the delta between two snapshots into typed change records.
//! Records are emitted in the fixed order Added, Updated, Completed, Deleted,
//! HierarchyChanged, with ties within a category broken by ascending id, so
//! diff output is deterministic and comparable in tests.
//!
//! One task transition can legitimately produce several records: a status
//! change to completed yields both an Updated record (the status field diff)
//! and a Completed record (the completion payload with efficiency).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::efficiency::efficiency;
use super::snapshot::{Snapshot, TaskTotals};
use crate::domain::{Task, TaskId, TaskStatus};

/// The fixed set of fields compared between snapshot versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangedField {
    Status,
    Priority,
    Progress,
    Assignee,
    DueDate,
    EstimatedHours,
    ActualHours,
    Parent,
    Children,
    Dependencies,
    Description,
    Title,
}

/// Before/after values for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub from: serde_json::Value,
    pub to: serde_json::Value,
}

/// A classified change between two snapshot versions of one task
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ChangeRecord {
    Added {
        task: Task,
    },
    Updated {
        id: TaskId,
        fields: BTreeMap<ChangedField, FieldChange>,
    },
    Completed {
        id: TaskId,
        previous_status: TaskStatus,
        completed_at: Option<DateTime<Utc>>,
        estimated_hours: Option<f64>,
        actual_hours: Option<f64>,
        efficiency: Option<f64>,
    },
    Deleted {
        task: Task,
        reason: String,
    },
    HierarchyChanged {
        id: TaskId,
        previous_parent: Option<TaskId>,
        current_parent: Option<TaskId>,
        previous_children: Vec<TaskId>,
        current_children: Vec<TaskId>,
    },
}

impl ChangeRecord {
    /// The id of the task this record describes
    pub fn task_id(&self) -> &TaskId {
        match self {
            ChangeRecord::Added { task } => &task.id,
            ChangeRecord::Updated { id, .. } => id,
            ChangeRecord::Completed { id, .. } => id,
            ChangeRecord::Deleted { task, .. } => &task.id,
            ChangeRecord::HierarchyChanged { id, .. } => id,
        }
    }
}

/// Output of a snapshot comparison
#[derive(Debug, Clone)]
pub struct DiffReport {
    /// Change records in the fixed category order, ids ascending per category
    pub records: Vec<ChangeRecord>,

    /// Counts by kind in the current snapshot, for the caller to validate
    /// against externally-declared totals
    pub current_totals: TaskTotals,
}

impl DiffReport {
    /// Returns true if nothing changed
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids of tasks that transitioned to completed in this diff
    pub fn completed_ids(&self) -> Vec<TaskId> {
        self.records
            .iter()
            .filter_map(|r| match r {
                ChangeRecord::Completed { id, .. } => Some(id.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Compares two snapshots and classifies every difference
pub fn diff(previous: &Snapshot, current: &Snapshot) -> DiffReport {
    let mut added = Vec::new();
    let mut updated = Vec::new();
    let mut completed = Vec::new();
    let mut deleted = Vec::new();
    let mut hierarchy = Vec::new();

    let mut current_ids: Vec<&TaskId> = current.ids().collect();
    current_ids.sort();
    let mut previous_ids: Vec<&TaskId> = previous.ids().collect();
    previous_ids.sort();

    for id in &current_ids {
        let task = match current.get(id) {
            Some(t) => t,
            None => continue,
        };

        let before = match previous.get(id) {
            Some(b) => b,
            None => {
                added.push(ChangeRecord::Added { task: task.clone() });
                continue;
            }
        };

        let fields = compare_fields(before, task);
        if !fields.is_empty() {
            updated.push(ChangeRecord::Updated {
                id: (*id).clone(),
                fields,
            });
        }

        // Completion fires independently of the field diff above.
        if !before.status.is_complete() && task.status.is_complete() {
            completed.push(ChangeRecord::Completed {
                id: (*id).clone(),
                previous_status: before.status,
                completed_at: task.completed_at,
                estimated_hours: task.estimated_hours,
                actual_hours: task.actual_hours,
                efficiency: efficiency(task.estimated_hours, task.actual_hours),
            });
        }

        if before.parent != task.parent || before.children != task.children {
            hierarchy.push(ChangeRecord::HierarchyChanged {
                id: (*id).clone(),
                previous_parent: before.parent.clone(),
                current_parent: task.parent.clone(),
                previous_children: before.children.clone(),
                current_children: task.children.clone(),
            });
        }
    }

    for id in &previous_ids {
        if !current.contains(id) {
            if let Some(task) = previous.get(id) {
                deleted.push(ChangeRecord::Deleted {
                    task: task.clone(),
                    reason: "removed from hierarchy".to_string(),
                });
            }
        }
    }

    let mut records = Vec::with_capacity(
        added.len() + updated.len() + completed.len() + deleted.len() + hierarchy.len(),
    );
    records.extend(added);
    records.extend(updated);
    records.extend(completed);
    records.extend(deleted);
    records.extend(hierarchy);

    DiffReport {
        records,
        current_totals: current.totals(),
    }
}

/// Compares the fixed field list; arrays compare by ordered value-equality
fn compare_fields(before: &Task, after: &Task) -> BTreeMap<ChangedField, FieldChange> {
    let mut fields = BTreeMap::new();

    let mut record = |field: ChangedField, from: serde_json::Value, to: serde_json::Value| {
        fields.insert(field, FieldChange { from, to });
    };

    if before.status != after.status {
        record(ChangedField::Status, json!(before.status), json!(after.status));
    }
    if before.priority != after.priority {
        record(ChangedField::Priority, json!(before.priority), json!(after.priority));
    }
    if before.progress != after.progress {
        record(ChangedField::Progress, json!(before.progress), json!(after.progress));
    }
    if before.assignee != after.assignee {
        record(ChangedField::Assignee, json!(before.assignee), json!(after.assignee));
    }
    if before.due_date != after.due_date {
        record(ChangedField::DueDate, json!(before.due_date), json!(after.due_date));
    }
    if before.estimated_hours != after.estimated_hours {
        record(
            ChangedField::EstimatedHours,
            json!(before.estimated_hours),
            json!(after.estimated_hours),
        );
    }
    if before.actual_hours != after.actual_hours {
        record(
            ChangedField::ActualHours,
            json!(before.actual_hours),
            json!(after.actual_hours),
        );
    }
    if before.parent != after.parent {
        record(ChangedField::Parent, json!(before.parent), json!(after.parent));
    }
    if before.children != after.children {
        record(ChangedField::Children, json!(before.children), json!(after.children));
    }
    if before.dependencies != after.dependencies {
        record(
            ChangedField::Dependencies,
            json!(before.dependencies),
            json!(after.dependencies),
        );
    }
    if before.description != after.description {
        record(
            ChangedField::Description,
            json!(before.description),
            json!(after.description),
        );
    }
    if before.title != after.title {
        record(ChangedField::Title, json!(before.title), json!(after.title));
    }

    fields
}
