//! Dependency graph for tasks
//!
//! Validates dependency edges (cycle rejection) and answers graph queries
//! over a set of tasks. Uses petgraph for graph operations. Hierarchy
//! (parent/child) cycles are checked separately in the store by walking the
//! parent chain; this graph covers dependency edges only.

use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use thiserror::Error;

use super::id::TaskId;
use super::task::{Task, TaskStatus};

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Adding dependency would create a cycle: {0} -> {1}")]
    CycleDetected(TaskId, TaskId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Self-dependency not allowed: {0}")]
    SelfDependency(TaskId),
}

/// A dependency graph over task IDs
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<TaskId, ()>,
    node_map: HashMap<TaskId, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Builds a graph from a collection of tasks
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Result<Self, GraphError> {
        let mut graph = Self::new();

        let tasks: Vec<_> = tasks.into_iter().collect();
        for task in &tasks {
            graph.add_task(task.id.clone());
        }

        for task in &tasks {
            for dep_id in &task.dependencies {
                graph.add_dependency(&task.id, dep_id)?;
            }
        }

        Ok(graph)
    }

    /// Adds a task node to the graph
    pub fn add_task(&mut self, task_id: TaskId) {
        if !self.node_map.contains_key(&task_id) {
            let idx = self.graph.add_node(task_id.clone());
            self.node_map.insert(task_id, idx);
        }
    }

    /// Removes a task from the graph (and all its edges)
    pub fn remove_task(&mut self, task_id: &TaskId) -> bool {
        if let Some(idx) = self.node_map.remove(task_id) {
            self.graph.remove_node(idx);
            // petgraph may reuse indices after removal
            self.rebuild_node_map();
            true
        } else {
            false
        }
    }

    fn rebuild_node_map(&mut self) {
        self.node_map.clear();
        for idx in self.graph.node_indices() {
            if let Some(task_id) = self.graph.node_weight(idx) {
                self.node_map.insert(task_id.clone(), idx);
            }
        }
    }

    /// Adds a dependency edge: `task` depends on `depends_on`
    ///
    /// The edge direction is depends_on -> task ("depends_on must be
    /// completed before task"). Rejects self-edges and edges that would make
    /// the graph cyclic.
    pub fn add_dependency(&mut self, task: &TaskId, depends_on: &TaskId) -> Result<(), GraphError> {
        if task == depends_on {
            return Err(GraphError::SelfDependency(task.clone()));
        }

        let task_idx = self
            .node_map
            .get(task)
            .ok_or_else(|| GraphError::TaskNotFound(task.clone()))?;

        let dep_idx = self
            .node_map
            .get(depends_on)
            .ok_or_else(|| GraphError::TaskNotFound(depends_on.clone()))?;

        self.graph.add_edge(*dep_idx, *task_idx, ());

        if is_cyclic_directed(&self.graph) {
            if let Some(edge) = self.graph.find_edge(*dep_idx, *task_idx) {
                self.graph.remove_edge(edge);
            }
            return Err(GraphError::CycleDetected(task.clone(), depends_on.clone()));
        }

        Ok(())
    }

    /// Removes a dependency edge
    pub fn remove_dependency(&mut self, task: &TaskId, depends_on: &TaskId) -> bool {
        let (task_idx, dep_idx) = match (self.node_map.get(task), self.node_map.get(depends_on)) {
            (Some(t), Some(d)) => (*t, *d),
            _ => return false,
        };

        if let Some(edge) = self.graph.find_edge(dep_idx, task_idx) {
            self.graph.remove_edge(edge);
            true
        } else {
            false
        }
    }

    /// Returns non-terminal tasks with every dependency complete
    pub fn ready_tasks(&self, statuses: &HashMap<TaskId, TaskStatus>) -> Vec<TaskId> {
        let mut ready: Vec<TaskId> = self
            .node_map
            .keys()
            .filter(|task_id| {
                let status = statuses.get(*task_id).copied().unwrap_or_default();
                if status.is_terminal() {
                    return false;
                }

                self.dependencies(task_id).iter().all(|dep_id| {
                    statuses
                        .get(dep_id)
                        .map(|s| s.is_complete())
                        .unwrap_or(false)
                })
            })
            .cloned()
            .collect();
        ready.sort();
        ready
    }

    /// Returns non-terminal tasks with at least one incomplete dependency
    pub fn blocked_tasks(&self, statuses: &HashMap<TaskId, TaskStatus>) -> Vec<TaskId> {
        let mut blocked: Vec<TaskId> = self
            .node_map
            .keys()
            .filter(|task_id| {
                let status = statuses.get(*task_id).copied().unwrap_or_default();
                if status.is_terminal() {
                    return false;
                }

                self.dependencies(task_id).iter().any(|dep_id| {
                    statuses
                        .get(dep_id)
                        .map(|s| !s.is_complete())
                        .unwrap_or(true)
                })
            })
            .cloned()
            .collect();
        blocked.sort();
        blocked
    }

    /// Returns the direct dependencies of a task
    pub fn dependencies(&self, task_id: &TaskId) -> Vec<TaskId> {
        let task_idx = match self.node_map.get(task_id) {
            Some(idx) => *idx,
            None => return vec![],
        };

        self.graph
            .neighbors_directed(task_idx, petgraph::Direction::Incoming)
            .filter_map(|idx| self.graph.node_weight(idx).cloned())
            .collect()
    }

    /// Returns the direct dependents of a task (tasks that depend on it)
    pub fn dependents(&self, task_id: &TaskId) -> Vec<TaskId> {
        let task_idx = match self.node_map.get(task_id) {
            Some(idx) => *idx,
            None => return vec![],
        };

        self.graph
            .neighbors_directed(task_idx, petgraph::Direction::Outgoing)
            .filter_map(|idx| self.graph.node_weight(idx).cloned())
            .collect()
    }

    /// Returns all tasks in topological order (dependencies before dependents)
    pub fn topological_order(&self) -> Option<Vec<TaskId>> {
        toposort(&self.graph, None).ok().map(|order| {
            order
                .into_iter()
                .filter_map(|idx| self.graph.node_weight(idx).cloned())
                .collect()
        })
    }

    /// Returns true if the graph contains the task
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.node_map.contains_key(task_id)
    }

    /// Returns the number of tasks in the graph
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }
}
