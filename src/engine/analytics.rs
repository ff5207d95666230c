//! Running analytics over the event stream
//!
//! Maintains per-kind event counters and, for completions, a running
//! estimation-efficiency average. Completion stats only advance when an
//! event carries a known efficiency, so the average is always well-defined;
//! the per-kind counter still counts every completion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::diff::ChangeRecord;
use super::events::{EngineEvent, EventKind, EventPayload};

/// Running completion-efficiency statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStats {
    pub total_completed: u64,
    pub efficiency_sum: f64,
    pub average_efficiency: f64,
}

/// Event counters and completion statistics for one session
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyticsAggregator {
    counts: BTreeMap<EventKind, u64>,
    completion_stats: CompletionStats,
}

impl AnalyticsAggregator {
    /// Creates an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds an aggregator from persisted counters
    pub fn restore(counts: BTreeMap<EventKind, u64>, completion_stats: CompletionStats) -> Self {
        Self {
            counts,
            completion_stats,
        }
    }

    /// Folds one event into the counters
    pub fn apply(&mut self, event: &EngineEvent) {
        *self.counts.entry(event.kind).or_insert(0) += 1;

        if let EventPayload::Change(ChangeRecord::Completed {
            efficiency: Some(eff),
            ..
        }) = &event.payload
        {
            self.completion_stats.total_completed += 1;
            self.completion_stats.efficiency_sum += eff;
            self.completion_stats.average_efficiency =
                self.completion_stats.efficiency_sum / self.completion_stats.total_completed as f64;
        }
    }

    /// Folds a batch of events, preserving order
    pub fn apply_all<'a>(&mut self, events: impl IntoIterator<Item = &'a EngineEvent>) {
        for event in events {
            self.apply(event);
        }
    }

    /// Count for one event kind
    pub fn count(&self, kind: EventKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// All per-kind counters
    pub fn counts(&self) -> &BTreeMap<EventKind, u64> {
        &self.counts
    }

    /// Completion statistics
    pub fn completion_stats(&self) -> CompletionStats {
        self.completion_stats
    }
}
