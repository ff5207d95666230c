//! Event and analytics sinks
//!
//! Two append-side artifacts live next to the snapshot document: an NDJSON
//! event log (`events.jsonl`, one event per line, append-only) and an
//! analytics summary (`analytics.json`, rewritten after every cycle). Both
//! are derived data; deleting them loses history but never task state.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::engine::{AnalyticsAggregator, CompletionStats, EngineEvent, EventKind, EventPayload};

/// One line of the event log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedEvent {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub message: String,
}

impl LoggedEvent {
    fn from_engine(event: &EngineEvent, session_id: &str) -> Result<Self> {
        Ok(Self {
            timestamp: event.timestamp,
            session_id: session_id.to_string(),
            kind: event.kind,
            payload: serde_json::to_value(&event.payload)
                .context("Failed to serialize event payload")?,
            message: describe(event),
        })
    }
}

/// Human-readable one-liner for an event
fn describe(event: &EngineEvent) -> String {
    match &event.payload {
        EventPayload::Change(record) => {
            format!("{} {}", event.kind.label(), record.task_id())
        }
        EventPayload::Enablement(enablement) => format!(
            "{} {} (by {})",
            event.kind.label(),
            enablement.enabled,
            enablement.enabled_by
        ),
    }
}

/// Append-only NDJSON event log
pub struct EventLog {
    path: PathBuf,
    session_id: String,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Appends a batch of events as one locked write
    pub fn append(&self, events: &[EngineEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open event log: {}", self.path.display()))?;

        file.lock_exclusive()
            .context("Failed to acquire lock on event log")?;

        let mut writer = std::io::BufWriter::new(&file);
        for event in events {
            let logged = LoggedEvent::from_engine(event, &self.session_id)?;
            let line =
                serde_json::to_string(&logged).context("Failed to serialize event log line")?;
            writeln!(writer, "{line}").context("Failed to write event log line")?;
        }
        writer.flush().context("Failed to flush event log")?;

        Ok(())
    }

    /// Reads the full log in file order (empty if no log exists yet)
    pub fn read_all(&self) -> Result<Vec<LoggedEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open event log: {}", self.path.display()))?;
        file.lock_shared()
            .context("Failed to acquire lock on event log")?;

        let reader = BufReader::new(&file);
        let mut events = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.context("Failed to read event log line")?;
            if line.trim().is_empty() {
                continue;
            }
            let event: LoggedEvent = serde_json::from_str(&line)
                .with_context(|| format!("Malformed event log line {}", index + 1))?;
            events.push(event);
        }
        Ok(events)
    }

    /// Reads the last `n` events in file order
    pub fn read_tail(&self, n: usize) -> Result<Vec<LoggedEvent>> {
        let mut events = self.read_all()?;
        if events.len() > n {
            events.drain(..events.len() - n);
        }
        Ok(events)
    }
}

/// Persisted analytics summary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsDocument {
    pub events: BTreeMap<EventKind, u64>,
    pub completion_stats: CompletionStats,
    pub last_updated: DateTime<Utc>,
}

/// Reads and writes the analytics summary
pub struct AnalyticsStore {
    path: PathBuf,
}

impl AnalyticsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Restores an aggregator from the persisted summary (empty if none)
    pub fn load(&self) -> Result<AnalyticsAggregator> {
        if !self.path.exists() {
            return Ok(AnalyticsAggregator::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open analytics: {}", self.path.display()))?;
        let document: AnalyticsDocument = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse analytics: {}", self.path.display()))?;

        Ok(AnalyticsAggregator::restore(
            document.events,
            document.completion_stats,
        ))
    }

    /// Writes the aggregator's current state as the new summary
    pub fn save(&self, analytics: &AnalyticsAggregator) -> Result<()> {
        let document = AnalyticsDocument {
            events: analytics.counts().clone(),
            completion_stats: analytics.completion_stats(),
            last_updated: Utc::now(),
        };

        let json =
            serde_json::to_string_pretty(&document).context("Failed to serialize analytics")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write analytics: {}", self.path.display()))?;

        Ok(())
    }
}
