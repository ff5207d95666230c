//! Task CLI commands
//!
//! Every mutating command runs the same commit workflow: load the snapshot
//! document, capture a baseline, apply the mutation, run one monitor cycle
//! against the new state, append the events, update analytics and rewrite
//! the document.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Subcommand;

use super::output::Output;
use crate::domain::{
    Priority, Task, TaskId, TaskInput, TaskKind, TaskPatch, TaskStatus, TaskStore,
};
use crate::engine::{efficiency, EngineEvent, EventKind, EventPayload, Monitor, Snapshot};
use crate::storage::Project;

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Add a task
    ///
    /// Examples:
    ///   trellis task add "Build API"
    ///   trellis task add "Design schema" --kind epic
    ///   trellis task add "Write tests" --parent t-1a2b3c4 --dep t-9f8e7d6
    Add {
        /// Task title
        title: String,

        /// Hierarchy tier (epic, task, subtask)
        #[arg(long, default_value = "task")]
        kind: String,

        /// Parent task ID
        #[arg(long)]
        parent: Option<String>,

        /// Dependency task ID (repeatable)
        #[arg(long = "dep")]
        deps: Vec<String>,

        /// Estimated hours
        #[arg(long)]
        estimate: Option<f64>,

        /// Priority (low, medium, high, critical)
        #[arg(long)]
        priority: Option<String>,

        /// Tag (repeatable)
        #[arg(long)]
        tag: Vec<String>,

        /// Assignee
        #[arg(long)]
        assignee: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        /// Longer description
        #[arg(long)]
        description: Option<String>,
    },

    /// List tasks
    List {
        /// Filter by status (pending, in_progress, completed, ...)
        #[arg(long)]
        status: Option<String>,

        /// Filter by tier (epic, task, subtask)
        #[arg(long)]
        kind: Option<String>,
    },

    /// Show task details
    Show {
        /// Task ID
        id: String,
    },

    /// Mark task as in progress
    Start {
        /// Task ID
        id: String,
    },

    /// Mark task as completed
    Done {
        /// Task ID
        id: String,

        /// Actual hours spent
        #[arg(long)]
        actual: Option<f64>,
    },

    /// Cancel a task
    Cancel {
        /// Task ID
        id: String,
    },

    /// Put a task on hold
    Hold {
        /// Task ID
        id: String,
    },

    /// Resume an on-hold task
    Resume {
        /// Task ID
        id: String,
    },

    /// Set task progress percentage
    Progress {
        /// Task ID
        id: String,

        /// Progress (0-100)
        percent: u8,
    },

    /// Remove a task
    Rm {
        /// Task ID
        id: String,
    },

    /// Add a dependency between tasks
    Dep {
        /// Task that will be blocked
        task: String,

        /// Task that must be completed first
        depends_on: String,
    },

    /// Remove a dependency
    Undep {
        /// Task to unblock
        task: String,

        /// Dependency to remove
        depends_on: String,
    },
}

pub fn run(cmd: TaskCommands, output: &Output) -> Result<()> {
    match cmd {
        TaskCommands::Add {
            title,
            kind,
            parent,
            deps,
            estimate,
            priority,
            tag,
            assignee,
            due,
            description,
        } => add_task(
            output,
            AddArgs {
                title,
                kind,
                parent,
                deps,
                estimate,
                priority,
                tags: tag,
                assignee,
                due,
                description,
            },
        ),
        TaskCommands::List { status, kind } => {
            list_tasks(output, status.as_deref(), kind.as_deref())
        }
        TaskCommands::Show { id } => show_task(output, &id),
        TaskCommands::Start { id } => transition(output, &id, TaskStatus::InProgress, None),
        TaskCommands::Done { id, actual } => transition(output, &id, TaskStatus::Completed, actual),
        TaskCommands::Cancel { id } => transition(output, &id, TaskStatus::Cancelled, None),
        TaskCommands::Hold { id } => transition(output, &id, TaskStatus::OnHold, None),
        TaskCommands::Resume { id } => transition(output, &id, TaskStatus::InProgress, None),
        TaskCommands::Progress { id, percent } => set_progress(output, &id, percent),
        TaskCommands::Rm { id } => remove_task(output, &id),
        TaskCommands::Dep { task, depends_on } => add_dependency(output, &task, &depends_on),
        TaskCommands::Undep { task, depends_on } => remove_dependency(output, &task, &depends_on),
    }
}

/// One mutating command against the persisted snapshot document
pub(super) struct Session {
    project: Project,
    store: TaskStore,
    baseline: Snapshot,
}

impl Session {
    /// Loads the project and captures the pre-mutation baseline
    pub(super) fn open(output: &Output) -> Result<Self> {
        let project = Project::open_current()?;
        let document = project.snapshot_store().load()?;

        if let Some(doc) = &document {
            if !doc.totals_consistent() {
                output.verbose_ctx(
                    "store",
                    &format!(
                        "document declares {} tasks but holds {}",
                        doc.metadata.total_tasks,
                        doc.task_count()
                    ),
                );
            }
        }

        let store = document.map(|d| d.into_store()).unwrap_or_default();
        let baseline = store.snapshot();
        output.verbose_ctx("store", &format!("loaded {} task(s)", store.len()));

        Ok(Self {
            project,
            store,
            baseline,
        })
    }

    pub(super) fn store(&self) -> &TaskStore {
        &self.store
    }

    pub(super) fn store_mut(&mut self) -> &mut TaskStore {
        &mut self.store
    }

    /// Replaces the working store wholesale (used by document import)
    pub(super) fn set_store(&mut self, store: TaskStore) {
        self.store = store;
    }

    /// Runs the monitor cycle over the mutation, applies the enablement
    /// policy, persists events, analytics and the new document
    pub(super) fn commit(mut self, output: &Output) -> Result<Vec<EngineEvent>> {
        let analytics = self.project.analytics_store().load()?;
        let mut monitor = Monitor::with_baseline(self.baseline).with_analytics(analytics);

        let cycle = monitor.cycle(self.store.snapshot());
        let mut events = cycle.events;

        if self.project.config().project.auto_start_enabled() && !cycle.enablements.is_empty() {
            for enablement in &cycle.enablements {
                self.store.update(
                    &enablement.enabled,
                    TaskPatch::status(TaskStatus::InProgress),
                )?;
                output.verbose_ctx("monitor", &format!("auto-started {}", enablement.enabled));
            }
            // record the policy-driven starts as a follow-up cycle
            events.extend(monitor.cycle(self.store.snapshot()).events);
        }

        if self.project.config().project.event_log_enabled {
            self.project.event_log().append(&events)?;
        }
        self.project.analytics_store().save(monitor.analytics())?;
        self.project.snapshot_store().save(&self.store)?;

        output.verbose_ctx("monitor", &format!("{} event(s) recorded", events.len()));
        Ok(events)
    }
}

/// Prints enablement announcements from a committed event batch
fn announce_enablements(output: &Output, events: &[EngineEvent]) {
    for event in events {
        if event.kind == EventKind::TaskEnabled {
            if let EventPayload::Enablement(enablement) = &event.payload {
                output.line(&format!(
                    "Enabled: {} (all dependencies of it are now complete)",
                    enablement.enabled
                ));
            }
        }
    }
}

struct AddArgs {
    title: String,
    kind: String,
    parent: Option<String>,
    deps: Vec<String>,
    estimate: Option<f64>,
    priority: Option<String>,
    tags: Vec<String>,
    assignee: Option<String>,
    due: Option<String>,
    description: Option<String>,
}

fn add_task(output: &Output, args: AddArgs) -> Result<()> {
    let mut session = Session::open(output)?;

    let mut input = TaskInput::new(parse_kind(&args.kind)?, &args.title);
    input.parent = args.parent.as_deref().map(str::parse).transpose()?;
    input.dependencies = args
        .deps
        .iter()
        .map(|d| d.parse())
        .collect::<Result<Vec<TaskId>, _>>()?;
    input.estimated_hours = args.estimate;
    if let Some(priority) = &args.priority {
        input.priority = parse_priority(priority)?;
    }
    input.tags = args.tags;
    input.assignee = args.assignee;
    input.due_date = args.due.as_deref().map(parse_due).transpose()?;
    input.description = args.description;

    let task = session.store_mut().create(input)?;
    let created = task.clone();
    session.commit(output)?;

    if output.is_json() {
        output.data(&created);
    } else {
        output.success(&format!("Created {}: {} - {}", created.kind.label(), created.id, created.title));
    }

    Ok(())
}

fn transition(
    output: &Output,
    id_str: &str,
    target: TaskStatus,
    actual_hours: Option<f64>,
) -> Result<()> {
    let mut session = Session::open(output)?;
    let id: TaskId = id_str.parse()?;

    let patch = TaskPatch {
        actual_hours,
        ..TaskPatch::status(target)
    };
    let task = session.store_mut().update(&id, patch)?;
    let updated = task.clone();
    let events = session.commit(output)?;

    if output.is_json() {
        output.data(&updated);
        return Ok(());
    }

    match target {
        TaskStatus::Completed => {
            output.success(&format!("Completed {}: {}", updated.id, updated.title));
            match efficiency(updated.estimated_hours, updated.actual_hours) {
                Some(value) => output.line(&format!("Efficiency: {}%", value)),
                None => output.verbose_ctx("monitor", "efficiency unknown (missing hours)"),
            }
            announce_enablements(output, &events);
        }
        TaskStatus::InProgress => {
            output.success(&format!("Started {}: {}", updated.id, updated.title))
        }
        TaskStatus::Cancelled => {
            output.success(&format!("Cancelled {}: {}", updated.id, updated.title))
        }
        TaskStatus::OnHold => {
            output.success(&format!("On hold {}: {}", updated.id, updated.title))
        }
        _ => output.success(&format!(
            "{} is now {}",
            updated.id,
            updated.status.label()
        )),
    }

    Ok(())
}

fn set_progress(output: &Output, id_str: &str, percent: u8) -> Result<()> {
    let mut session = Session::open(output)?;
    let id: TaskId = id_str.parse()?;

    let task = session.store_mut().update(&id, TaskPatch::progress(percent))?;
    let updated = task.clone();
    let events = session.commit(output)?;

    if output.is_json() {
        output.data(&updated);
    } else {
        output.success(&format!(
            "{} progress: {}% ({})",
            updated.id,
            updated.progress,
            updated.status.label()
        ));
        // reaching 100 completes the task, which may unblock dependents
        announce_enablements(output, &events);
    }

    Ok(())
}

fn remove_task(output: &Output, id_str: &str) -> Result<()> {
    let mut session = Session::open(output)?;
    let id: TaskId = id_str.parse()?;

    let removed = session.store_mut().remove(&id)?;
    session.commit(output)?;

    if output.is_json() {
        output.data(&removed);
    } else {
        output.success(&format!("Removed {}: {}", removed.id, removed.title));
    }

    Ok(())
}

fn add_dependency(output: &Output, task_str: &str, depends_on_str: &str) -> Result<()> {
    let mut session = Session::open(output)?;
    let task_id: TaskId = task_str.parse()?;
    let dep_id: TaskId = depends_on_str.parse()?;

    let current = session
        .store()
        .get(&task_id)
        .with_context(|| format!("Task not found: {}", task_id))?;
    if current.dependencies.contains(&dep_id) {
        bail!("{} already depends on {}", task_id, dep_id);
    }

    let mut dependencies = current.dependencies.clone();
    dependencies.push(dep_id.clone());
    session.store_mut().update(
        &task_id,
        TaskPatch {
            dependencies: Some(dependencies),
            ..TaskPatch::default()
        },
    )?;
    session.commit(output)?;

    output.success(&format!("{} now depends on {}", task_id, dep_id));
    Ok(())
}

fn remove_dependency(output: &Output, task_str: &str, depends_on_str: &str) -> Result<()> {
    let mut session = Session::open(output)?;
    let task_id: TaskId = task_str.parse()?;
    let dep_id: TaskId = depends_on_str.parse()?;

    let current = session
        .store()
        .get(&task_id)
        .with_context(|| format!("Task not found: {}", task_id))?;
    if !current.dependencies.contains(&dep_id) {
        bail!("{} does not depend on {}", task_id, dep_id);
    }

    let dependencies: Vec<TaskId> = current
        .dependencies
        .iter()
        .filter(|d| **d != dep_id)
        .cloned()
        .collect();
    session.store_mut().update(
        &task_id,
        TaskPatch {
            dependencies: Some(dependencies),
            ..TaskPatch::default()
        },
    )?;
    session.commit(output)?;

    output.success(&format!("{} no longer depends on {}", task_id, dep_id));
    Ok(())
}

fn list_tasks(output: &Output, status: Option<&str>, kind: Option<&str>) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.snapshot_store().load_store()?;

    let status_filter = status.map(parse_status).transpose()?;
    let kind_filter = kind.map(parse_kind).transpose()?;

    let tasks: Vec<&Task> = store
        .all()
        .into_iter()
        .filter(|t| status_filter.map_or(true, |s| t.status == s))
        .filter(|t| kind_filter.map_or(true, |k| t.kind == k))
        .collect();

    if output.is_json() {
        output.data(&tasks);
    } else if tasks.is_empty() {
        output.line("No tasks");
    } else {
        output.line(&format!(
            "{:<10} {:<8} {:<12} {:>5}  TITLE",
            "ID", "KIND", "STATUS", "PROG"
        ));
        output.line(&"-".repeat(60));
        for task in &tasks {
            output.line(&format!(
                "{:<10} {:<8} {:<12} {:>4}%  {}",
                task.id.to_string(),
                task.kind.label(),
                task.status.label(),
                task.progress,
                task.title
            ));
        }
        output.blank();
        output.line(&format!("{} task(s)", tasks.len()));
    }

    Ok(())
}

fn show_task(output: &Output, id_str: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.snapshot_store().load_store()?;
    let id: TaskId = id_str.parse()?;

    let task = store
        .get(&id)
        .with_context(|| format!("Task not found: {}", id))?;

    if output.is_json() {
        output.data(task);
        return Ok(());
    }

    output.header(&format!("{} - {}", task.id, task.title));
    output.line(&format!("Kind:       {} (level {})", task.kind.label(), task.level));
    output.line(&format!("Status:     {}", task.status.label()));
    output.line(&format!("Priority:   {}", task.priority.label()));
    output.line(&format!("Progress:   {}%", task.progress));
    if let Some(description) = &task.description {
        output.line(&format!("About:      {}", description));
    }
    if let Some(parent) = &task.parent {
        output.line(&format!("Parent:     {}", parent));
    }
    if !task.children.is_empty() {
        output.line(&format!("Children:   {}", join_ids(&task.children)));
    }
    if !task.dependencies.is_empty() {
        output.line(&format!("Depends on: {}", join_ids(&task.dependencies)));
    }
    if !task.enables.is_empty() {
        output.line(&format!("Enables:    {}", join_ids(&task.enables)));
    }
    if let Some(estimate) = task.estimated_hours {
        output.line(&format!("Estimate:   {}h", estimate));
    }
    if let Some(actual) = task.actual_hours {
        output.line(&format!("Actual:     {}h", actual));
    }
    if let Some(value) = efficiency(task.estimated_hours, task.actual_hours) {
        output.line(&format!("Efficiency: {}%", value));
    }
    if let Some(assignee) = &task.assignee {
        output.line(&format!("Assignee:   {}", assignee));
    }
    if !task.tags.is_empty() {
        output.line(&format!("Tags:       {}", task.tags.join(", ")));
    }
    if let Some(due) = task.due_date {
        output.line(&format!("Due:        {}", due.format("%Y-%m-%d")));
    }
    if let Some(completed_at) = task.completed_at {
        output.line(&format!("Completed:  {}", completed_at.format("%Y-%m-%d %H:%M")));
    }

    Ok(())
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_kind(value: &str) -> Result<TaskKind> {
    match value {
        "epic" => Ok(TaskKind::Epic),
        "task" => Ok(TaskKind::Task),
        "subtask" => Ok(TaskKind::Subtask),
        other => bail!("Unknown kind '{}' (expected epic, task or subtask)", other),
    }
}

fn parse_priority(value: &str) -> Result<Priority> {
    match value {
        "low" => Ok(Priority::Low),
        "medium" => Ok(Priority::Medium),
        "high" => Ok(Priority::High),
        "critical" => Ok(Priority::Critical),
        other => bail!(
            "Unknown priority '{}' (expected low, medium, high or critical)",
            other
        ),
    }
}

fn parse_status(value: &str) -> Result<TaskStatus> {
    match value {
        "pending" => Ok(TaskStatus::Pending),
        "in_progress" => Ok(TaskStatus::InProgress),
        "blocked" => Ok(TaskStatus::Blocked),
        "completed" => Ok(TaskStatus::Completed),
        "cancelled" => Ok(TaskStatus::Cancelled),
        "on_hold" => Ok(TaskStatus::OnHold),
        other => bail!("Unknown status '{}'", other),
    }
}

fn parse_due(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(timestamp) = value.parse::<DateTime<Utc>>() {
        return Ok(timestamp);
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid due date '{}' (expected YYYY-MM-DD)", value))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .context("Invalid due date")?;
    Ok(DateTime::from_naive_utc_and_offset(midnight, Utc))
}
