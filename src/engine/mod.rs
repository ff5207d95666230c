//! # Monitoring Engine
//!
//! Snapshot diffing and dependency-cascade resolution over the task
//! hierarchy.
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`Snapshot`] | Immutable point-in-time copy of the task collection |
//! | [`diff`] | Classifies the delta between two snapshots |
//! | [`efficiency`] | Estimation-accuracy percentage |
//! | [`resolve_enablement`] | Dependents unblocked by a completion |
//! | [`EventBus`] | Ordered in-process event stream |
//! | [`AnalyticsAggregator`] | Running counters over the event stream |
//! | [`Monitor`] | Drives one diff cycle end to end |
//!
//! ## Cycle model
//!
//! One snapshot comparison and its cascade/event publication run to
//! completion before the next snapshot is captured; [`Monitor`] enforces
//! that by taking `&mut self`. The diff, resolver and efficiency functions
//! are pure over already-captured snapshots and safe to call from any
//! thread.

mod analytics;
mod diff;
mod efficiency;
mod events;
mod resolve;
mod snapshot;

pub use analytics::{AnalyticsAggregator, CompletionStats};
pub use diff::{diff, ChangeRecord, ChangedField, DiffReport, FieldChange};
pub use efficiency::efficiency;
pub use events::{EngineEvent, EventBus, EventKind, EventPayload};
pub use resolve::{resolve_enablement, EnablementEvent};
pub use snapshot::{Snapshot, TaskTotals};

/// Outcome of one monitoring cycle
#[derive(Debug)]
pub struct CycleReport {
    /// The classified snapshot delta
    pub report: DiffReport,

    /// Enablement cascades triggered by this cycle's completions
    pub enablements: Vec<EnablementEvent>,

    /// Everything published on the bus, in publication order
    pub events: Vec<EngineEvent>,
}

impl CycleReport {
    /// Returns true if the cycle observed no changes
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Drives diff cycles: compares each new snapshot against the last known
/// one, resolves enablement for every new completion, publishes the results
/// in fixed order and keeps analytics current.
#[derive(Debug)]
pub struct Monitor {
    previous: Snapshot,
    bus: EventBus,
    analytics: AnalyticsAggregator,
}

impl Monitor {
    /// Creates a monitor with an empty baseline
    pub fn new() -> Self {
        Self::with_baseline(Snapshot::empty())
    }

    /// Creates a monitor whose first cycle diffs against `baseline`
    pub fn with_baseline(baseline: Snapshot) -> Self {
        Self {
            previous: baseline,
            bus: EventBus::new(),
            analytics: AnalyticsAggregator::new(),
        }
    }

    /// Seeds the analytics counters (e.g. restored from a previous session)
    pub fn with_analytics(mut self, analytics: AnalyticsAggregator) -> Self {
        self.analytics = analytics;
        self
    }

    /// The last snapshot the monitor has seen
    pub fn previous(&self) -> &Snapshot {
        &self.previous
    }

    /// Current analytics state
    pub fn analytics(&self) -> &AnalyticsAggregator {
        &self.analytics
    }

    /// Runs one full cycle against `current`, which becomes the new baseline
    pub fn cycle(&mut self, current: Snapshot) -> CycleReport {
        let report = diff(&self.previous, &current);

        // Several completions in one cycle may unblock the same task; the
        // first attribution wins (completed ids arrive in ascending order).
        let mut enablements: Vec<EnablementEvent> = Vec::new();
        for completed_id in report.completed_ids() {
            for enablement in resolve_enablement(&current, &completed_id) {
                if enablements.iter().all(|e| e.enabled != enablement.enabled) {
                    enablements.push(enablement);
                }
            }
        }

        self.bus.publish_cycle(&report, &enablements);
        let events = self.bus.drain();
        self.analytics.apply_all(&events);

        self.previous = current;

        CycleReport {
            report,
            enablements,
            events,
        }
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}
