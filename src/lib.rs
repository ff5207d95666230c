//! Trellis CLI - Task hierarchy and dependency monitoring
//!
//! Trellis organizes work as a three-tier hierarchy (epics, tasks, subtasks)
//! with explicit dependency edges. A snapshot-diffing monitor classifies
//! every change, resolves which tasks a completion unblocks, and keeps an
//! append-only event history with running analytics.

pub mod cli;
pub mod domain;
pub mod engine;
pub mod storage;

pub use domain::{Task, TaskId, TaskKind, TaskStatus, TaskStore};
pub use engine::{diff, Monitor, Snapshot};
