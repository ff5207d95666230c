//! Dependency-driven enablement resolution
//!
//! When a task completes, its pending dependents may become unblocked. A
//! dependent is enabled only when *every* task in its dependency set is
//! completed in the snapshot, not just the one that triggered the check; a
//! task with several outstanding blockers stays blocked until the last one
//! closes the set.
//!
//! The resolver is purely advisory: it mutates nothing, and acting on an
//! enablement (e.g. auto-starting the task) is the caller's policy decision.

use serde::{Deserialize, Serialize};

use super::snapshot::Snapshot;
use crate::domain::TaskId;

/// A pending task whose full dependency set just became satisfied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnablementEvent {
    /// The task that became unblocked
    pub enabled: TaskId,

    /// The completion that closed its dependency set
    pub enabled_by: TaskId,
}

/// Finds every pending dependent of `completed_id` whose dependencies are all
/// completed in `snapshot`. Results are ordered by ascending enabled id.
pub fn resolve_enablement(snapshot: &Snapshot, completed_id: &TaskId) -> Vec<EnablementEvent> {
    let mut events: Vec<EnablementEvent> = snapshot
        .tasks()
        .filter(|task| task.status.is_pending())
        .filter(|task| task.dependencies.contains(completed_id))
        .filter(|task| {
            task.dependencies.iter().all(|dep_id| {
                snapshot
                    .get(dep_id)
                    .map(|dep| dep.status.is_complete())
                    .unwrap_or(false)
            })
        })
        .map(|task| EnablementEvent {
            enabled: task.id.clone(),
            enabled_by: completed_id.clone(),
        })
        .collect();

    events.sort_by(|a, b| a.enabled.cmp(&b.enabled));
    events
}
