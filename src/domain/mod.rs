//! Domain models for Trellis
//!
//! Contains the task hierarchy and its invariants without any I/O concerns.

mod graph;
mod id;
mod store;
mod task;

pub use graph::{DependencyGraph, GraphError};
pub use id::{IdError, TaskId};
pub use store::{StoreError, TaskInput, TaskPatch, TaskStore};
pub use task::{Priority, Task, TaskKind, TaskMeta, TaskStatus};
