//! Ordered in-process event stream
//!
//! The bus carries typed events produced by one diff cycle, in a fixed
//! publication order: change records in diff order (Added, Updated,
//! Completed, Deleted, HierarchyChanged), with enablement events inserted
//! directly after the completed block, since enablement depends on the
//! completions already being known. Consumers drain the queue synchronously
//! at the end of a cycle; there are no re-entrant callbacks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::diff::{ChangeRecord, DiffReport};
use super::resolve::EnablementEvent;

/// Discriminant for event counting and sink routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskAdded,
    TaskUpdated,
    TaskCompleted,
    TaskDeleted,
    HierarchyChanged,
    TaskEnabled,
}

impl EventKind {
    /// Returns the wire label for the kind
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::TaskAdded => "task_added",
            EventKind::TaskUpdated => "task_updated",
            EventKind::TaskCompleted => "task_completed",
            EventKind::TaskDeleted => "task_deleted",
            EventKind::HierarchyChanged => "hierarchy_changed",
            EventKind::TaskEnabled => "task_enabled",
        }
    }
}

/// Payload of an engine event
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    Change(ChangeRecord),
    Enablement(EnablementEvent),
}

/// A timestamped event on the bus
#[derive(Debug, Clone, Serialize)]
pub struct EngineEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub payload: EventPayload,
}

impl EngineEvent {
    fn from_record(record: ChangeRecord) -> Self {
        let kind = match &record {
            ChangeRecord::Added { .. } => EventKind::TaskAdded,
            ChangeRecord::Updated { .. } => EventKind::TaskUpdated,
            ChangeRecord::Completed { .. } => EventKind::TaskCompleted,
            ChangeRecord::Deleted { .. } => EventKind::TaskDeleted,
            ChangeRecord::HierarchyChanged { .. } => EventKind::HierarchyChanged,
        };
        Self {
            timestamp: Utc::now(),
            kind,
            payload: EventPayload::Change(record),
        }
    }

    fn from_enablement(event: EnablementEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: EventKind::TaskEnabled,
            payload: EventPayload::Enablement(event),
        }
    }
}

/// Ordered, single-consumer event queue
#[derive(Debug, Default)]
pub struct EventBus {
    queue: VecDeque<EngineEvent>,
}

impl EventBus {
    /// Creates an empty bus
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Publishes a single event at the back of the queue
    pub fn publish(&mut self, event: EngineEvent) {
        self.queue.push_back(event);
    }

    /// Publishes everything one diff cycle produced, in the fixed order:
    /// diff records with enablement events inserted after the completed block
    pub fn publish_cycle(&mut self, report: &DiffReport, enablements: &[EnablementEvent]) {
        let mut enablements_pending = !enablements.is_empty();

        for record in &report.records {
            // the completed block ends at the first deleted/hierarchy record
            if enablements_pending
                && matches!(
                    record,
                    ChangeRecord::Deleted { .. } | ChangeRecord::HierarchyChanged { .. }
                )
            {
                self.publish_enablements(enablements);
                enablements_pending = false;
            }
            self.publish(EngineEvent::from_record(record.clone()));
        }

        if enablements_pending {
            self.publish_enablements(enablements);
        }
    }

    fn publish_enablements(&mut self, enablements: &[EnablementEvent]) {
        for event in enablements {
            self.publish(EngineEvent::from_enablement(event.clone()));
        }
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if no events are queued
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Removes and returns every queued event, preserving order
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        self.queue.drain(..).collect()
    }
}
