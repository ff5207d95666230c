//! Task ID system
//!
//! ID Format: `{kind-prefix}-{7-char-hash}`
//! - Epics: `e-{hash}` (e.g., `e-7f2b4c1`)
//! - Tasks: `t-{hash}` (e.g., `t-9d3e5f2`)
//! - Subtasks: `s-{hash}` (e.g., `s-4a1c8e3`)
//!
//! Hash is derived from title + creation timestamp, ensuring uniqueness.
//! Same title at different times produces different IDs. The prefix is a
//! readability aid; the authoritative kind lives on the task record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::task::TaskKind;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid task ID format: expected '{{e|t|s}}-{{7-char-hash}}', got '{0}'")]
    InvalidTaskId(String),
}

/// Generates a 7-character hash from title and timestamp
fn generate_hash(title: &str, timestamp: DateTime<Utc>) -> String {
    let input = format!("{}{}", title, timestamp.timestamp_nanos_opt().unwrap_or(0));
    let hash = blake3::hash(input.as_bytes());
    let hex = hash.to_hex();
    hex[..7].to_string()
}

/// Task ID in the format `{e|t|s}-{7-char-hash}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId {
    prefix: char,
    hash: String,
}

impl TaskId {
    /// Creates a new ID for a task of the given kind from title and timestamp
    pub fn new(kind: TaskKind, title: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            prefix: kind_prefix(kind),
            hash: generate_hash(title, timestamp),
        }
    }

    /// Returns the hash portion of the ID
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Returns the kind suggested by the ID prefix
    pub fn kind_hint(&self) -> TaskKind {
        match self.prefix {
            'e' => TaskKind::Epic,
            's' => TaskKind::Subtask,
            _ => TaskKind::Task,
        }
    }
}

fn kind_prefix(kind: TaskKind) -> char {
    match kind {
        TaskKind::Epic => 'e',
        TaskKind::Task => 't',
        TaskKind::Subtask => 's',
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.hash)
    }
}

impl FromStr for TaskId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (prefix, hash) = match s.split_once('-') {
            Some((p, h)) => (p, h),
            None => return Err(IdError::InvalidTaskId(s.to_string())),
        };

        if !matches!(prefix, "e" | "t" | "s") {
            return Err(IdError::InvalidTaskId(s.to_string()));
        }

        if hash.len() != 7 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IdError::InvalidTaskId(s.to_string()));
        }

        Ok(Self {
            prefix: prefix.chars().next().unwrap(),
            hash: hash.to_string(),
        })
    }
}

impl TryFrom<String> for TaskId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_generation_is_unique_for_different_timestamps() {
        let title = "Same Title";
        let ts1 = Utc::now();
        let ts2 = ts1 + chrono::Duration::nanoseconds(1);

        let id1 = TaskId::new(TaskKind::Task, title, ts1);
        let id2 = TaskId::new(TaskKind::Task, title, ts2);

        assert_ne!(id1, id2);
    }

    #[test]
    fn id_format_matches_kind() {
        let ts = Utc::now();

        let epic = TaskId::new(TaskKind::Epic, "Epic", ts);
        let task = TaskId::new(TaskKind::Task, "Task", ts);
        let subtask = TaskId::new(TaskKind::Subtask, "Subtask", ts);

        assert!(epic.to_string().starts_with("e-"));
        assert!(task.to_string().starts_with("t-"));
        assert!(subtask.to_string().starts_with("s-"));
        assert_eq!(task.to_string().len(), 9); // "t-" + 7 chars
    }

    #[test]
    fn id_parses_correctly() {
        let original = TaskId::new(TaskKind::Epic, "Test", Utc::now());
        let s = original.to_string();
        let parsed: TaskId = s.parse().unwrap();

        assert_eq!(original, parsed);
    }

    #[test]
    fn id_rejects_invalid_format() {
        assert!("invalid".parse::<TaskId>().is_err());
        assert!("t-short".parse::<TaskId>().is_err());
        assert!("t-toolonggg".parse::<TaskId>().is_err());
        assert!("t-gggggg1".parse::<TaskId>().is_err()); // 'g' is not hex
        assert!("x-1234567".parse::<TaskId>().is_err()); // unknown prefix
    }

    #[test]
    fn kind_hint_follows_prefix() {
        assert_eq!("e-1234567".parse::<TaskId>().unwrap().kind_hint(), TaskKind::Epic);
        assert_eq!("t-1234567".parse::<TaskId>().unwrap().kind_hint(), TaskKind::Task);
        assert_eq!("s-1234567".parse::<TaskId>().unwrap().kind_hint(), TaskKind::Subtask);
    }

    #[test]
    fn serde_roundtrip() {
        let original = TaskId::new(TaskKind::Subtask, "Test", Utc::now());
        let json = serde_json::to_string(&original).unwrap();
        let parsed: TaskId = serde_json::from_str(&json).unwrap();

        assert_eq!(original, parsed);
    }

    #[test]
    fn ids_order_by_string_form() {
        let a: TaskId = "e-1234567".parse().unwrap();
        let b: TaskId = "t-1234567".parse().unwrap();

        assert!(a < b);
    }
}
