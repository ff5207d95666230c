//! Read-only query commands (status, ready, blocked, events)

use std::collections::BTreeMap;

use anyhow::Result;

use super::output::Output;
use crate::domain::Task;
use crate::engine::EventKind;
use crate::storage::Project;

/// Project status overview: tier totals, status counts, completion stats
pub fn status(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.snapshot_store().load_store()?;
    let analytics = project.analytics_store().load()?;

    let snapshot = store.snapshot();
    let totals = snapshot.totals();

    let mut by_status: BTreeMap<&'static str, usize> = BTreeMap::new();
    for task in snapshot.tasks() {
        *by_status.entry(task.status.label()).or_insert(0) += 1;
    }

    let statuses = store.statuses();
    let graph = store.dependency_graph();
    let ready = graph.ready_tasks(&statuses).len();
    let blocked = graph.blocked_tasks(&statuses).len();
    let stats = analytics.completion_stats();

    if output.is_json() {
        output.data(&serde_json::json!({
            "totals": {
                "tasks": totals.total(),
                "epics": totals.epics,
                "topLevel": totals.tasks,
                "subtasks": totals.subtasks,
            },
            "byStatus": by_status,
            "ready": ready,
            "blocked": blocked,
            "completionStats": stats,
        }));
        return Ok(());
    }

    output.header("Project status");
    output.line(&format!(
        "Tasks:      {} ({} epics, {} tasks, {} subtasks)",
        totals.total(),
        totals.epics,
        totals.tasks,
        totals.subtasks
    ));
    for (label, count) in &by_status {
        output.line(&format!("  {:<12} {}", label, count));
    }
    output.blank();
    output.line(&format!("Ready:      {}", ready));
    output.line(&format!("Blocked:    {}", blocked));
    if stats.total_completed > 0 {
        output.line(&format!(
            "Efficiency: {:.2}% average over {} completion(s)",
            stats.average_efficiency, stats.total_completed
        ));
    }

    Ok(())
}

/// Tasks whose dependency sets are fully satisfied
pub fn ready(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.snapshot_store().load_store()?;

    let statuses = store.statuses();
    let ids = store.dependency_graph().ready_tasks(&statuses);
    let tasks: Vec<&Task> = ids.iter().filter_map(|id| store.get(id)).collect();

    list_section(output, "Ready to work on", &tasks, |_| String::new());
    Ok(())
}

/// Tasks waiting on incomplete dependencies
pub fn blocked(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.snapshot_store().load_store()?;

    let statuses = store.statuses();
    let graph = store.dependency_graph();
    let ids = graph.blocked_tasks(&statuses);
    let tasks: Vec<&Task> = ids.iter().filter_map(|id| store.get(id)).collect();

    list_section(output, "Blocked", &tasks, |task| {
        let waiting: Vec<String> = task
            .dependencies
            .iter()
            .filter(|dep| {
                statuses
                    .get(*dep)
                    .map(|s| !s.is_complete())
                    .unwrap_or(true)
            })
            .map(|dep| dep.to_string())
            .collect();
        format!("  waiting on {}", waiting.join(", "))
    });
    Ok(())
}

/// Recent monitoring events from the log
pub fn events(output: &Output, tail: Option<usize>) -> Result<()> {
    let project = Project::open_current()?;
    let log = project.event_log();

    let events = match tail {
        Some(n) => log.read_tail(n)?,
        None => log.read_all()?,
    };

    if events.is_empty() {
        if output.is_text() {
            output.line("No events recorded");
        } else {
            output.data(&events);
        }
        return Ok(());
    }

    let enabled = events
        .iter()
        .filter(|e| e.kind == EventKind::TaskEnabled)
        .count();
    output.verbose_ctx(
        "events",
        &format!("{} event(s), {} enablement(s)", events.len(), enabled),
    );

    for event in &events {
        output.event(event);
    }

    Ok(())
}

fn list_section(
    output: &Output,
    title: &str,
    tasks: &[&Task],
    annotate: impl Fn(&Task) -> String,
) {
    if output.is_json() {
        output.data(&tasks);
        return;
    }

    if tasks.is_empty() {
        output.line(&format!("{}: none", title));
        return;
    }

    output.header(title);
    for task in tasks {
        let annotation = annotate(task);
        output.line(&format!(
            "{:<10} {:<12} {}{}",
            task.id.to_string(),
            task.status.label(),
            task.title,
            annotation
        ));
    }
    output.blank();
    output.line(&format!("{} task(s)", tasks.len()));
}
