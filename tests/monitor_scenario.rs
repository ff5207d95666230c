//! End-to-end monitoring scenarios against the library API
//!
//! Drives the monitor the way the CLI does, without the process boundary:
//! mutate a store, snapshot, cycle, inspect the classified output.

use proptest::prelude::*;

use trellis_cli::domain::{TaskId, TaskInput, TaskKind, TaskPatch, TaskStatus, TaskStore};
use trellis_cli::engine::{diff, ChangeRecord, EventKind, Monitor, Snapshot};

fn add(store: &mut TaskStore, kind: TaskKind, title: &str, deps: &[&TaskId]) -> TaskId {
    let mut input = TaskInput::new(kind, title);
    input.dependencies = deps.iter().map(|d| (*d).clone()).collect();
    store.create(input).unwrap().id
}

fn complete(store: &mut TaskStore, id: &TaskId) {
    store
        .update(id, TaskPatch::status(TaskStatus::Completed))
        .unwrap();
}

#[test]
fn release_scenario_produces_expected_event_stream() {
    // an epic with a chain: schema -> api -> tests, plus an independent doc task
    let mut store = TaskStore::new();
    let epic = add(&mut store, TaskKind::Epic, "Release 1.0", &[]);
    let schema = {
        let mut input = TaskInput::new(TaskKind::Task, "Design schema");
        input.parent = Some(epic.clone());
        input.estimated_hours = Some(8.0);
        store.create(input).unwrap().id
    };
    let api = {
        let mut input = TaskInput::new(TaskKind::Task, "Build API");
        input.parent = Some(epic.clone());
        input.dependencies = vec![schema.clone()];
        store.create(input).unwrap().id
    };
    let tests = {
        let mut input = TaskInput::new(TaskKind::Task, "Write tests");
        input.parent = Some(epic.clone());
        input.dependencies = vec![api.clone()];
        store.create(input).unwrap().id
    };
    add(&mut store, TaskKind::Task, "Write docs", &[]);

    let mut monitor = Monitor::new();

    // cycle 1: everything shows up as added
    let cycle = monitor.cycle(store.snapshot());
    assert_eq!(cycle.events.len(), 5);
    assert!(cycle.events.iter().all(|e| e.kind == EventKind::TaskAdded));

    // cycle 2: finishing the schema unblocks the api task only
    store
        .update(
            &schema,
            TaskPatch {
                actual_hours: Some(4.0),
                ..TaskPatch::status(TaskStatus::Completed)
            },
        )
        .unwrap();
    let cycle = monitor.cycle(store.snapshot());

    let kinds: Vec<EventKind> = cycle.events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::TaskUpdated,
            EventKind::TaskCompleted,
            EventKind::TaskEnabled,
        ]
    );
    assert_eq!(cycle.enablements[0].enabled, api);
    assert_eq!(cycle.enablements[0].enabled_by, schema);

    // the completion record carries the measured efficiency
    let completed = cycle
        .report
        .records
        .iter()
        .find_map(|r| match r {
            ChangeRecord::Completed { efficiency, .. } => Some(*efficiency),
            _ => None,
        })
        .unwrap();
    assert_eq!(completed, Some(200.0));

    // cycle 3: api completion cascades to tests
    complete(&mut store, &api);
    let cycle = monitor.cycle(store.snapshot());
    assert_eq!(cycle.enablements[0].enabled, tests);

    // analytics saw two completions, one with known efficiency
    assert_eq!(monitor.analytics().count(EventKind::TaskCompleted), 2);
    assert_eq!(monitor.analytics().completion_stats().total_completed, 1);
    assert_eq!(
        monitor.analytics().completion_stats().average_efficiency,
        200.0
    );
}

#[test]
fn reparenting_surfaces_hierarchy_changes() {
    let mut store = TaskStore::new();
    let old_epic = add(&mut store, TaskKind::Epic, "Old home", &[]);
    let new_epic = add(&mut store, TaskKind::Epic, "New home", &[]);
    let task = {
        let mut input = TaskInput::new(TaskKind::Task, "Mover");
        input.parent = Some(old_epic.clone());
        store.create(input).unwrap().id
    };

    let mut monitor = Monitor::with_baseline(store.snapshot());
    store
        .update(
            &task,
            TaskPatch {
                parent: Some(Some(new_epic.clone())),
                ..TaskPatch::default()
            },
        )
        .unwrap();
    let cycle = monitor.cycle(store.snapshot());

    // both epics lose/gain a child and the task itself moves
    let hierarchy: Vec<&TaskId> = cycle
        .report
        .records
        .iter()
        .filter(|r| matches!(r, ChangeRecord::HierarchyChanged { .. }))
        .map(|r| r.task_id())
        .collect();
    assert_eq!(hierarchy.len(), 3);
    assert!(hierarchy.contains(&&old_epic));
    assert!(hierarchy.contains(&&new_epic));
    assert!(hierarchy.contains(&&task));
}

#[test]
fn deletion_mid_chain_reports_both_sides() {
    let mut store = TaskStore::new();
    let a = add(&mut store, TaskKind::Task, "Head", &[]);
    let b = add(&mut store, TaskKind::Task, "Middle", &[&a]);
    let c = add(&mut store, TaskKind::Task, "Tail", &[&b]);

    let mut monitor = Monitor::with_baseline(store.snapshot());
    store.remove(&b).unwrap();
    let cycle = monitor.cycle(store.snapshot());

    // one deletion, and the tail's dependency list shrank
    let kinds: Vec<EventKind> = cycle.events.iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&EventKind::TaskDeleted));
    assert!(kinds.contains(&EventKind::TaskUpdated));
    assert!(store.get(&c).unwrap().dependencies.is_empty());
}

// Strategy: a small store where each task may depend on an earlier one, so
// the result is always acyclic
fn arbitrary_store() -> impl Strategy<Value = TaskStore> {
    proptest::collection::vec((0u8..3, any::<bool>()), 1..12).prop_map(|specs| {
        let mut store = TaskStore::new();
        let mut ids: Vec<TaskId> = Vec::new();
        for (i, (kind, dep_on_prev)) in specs.into_iter().enumerate() {
            let kind = match kind {
                0 => TaskKind::Epic,
                1 => TaskKind::Task,
                _ => TaskKind::Subtask,
            };
            let mut input = TaskInput::new(kind, format!("task {i}"));
            if dep_on_prev {
                if let Some(prev) = ids.last() {
                    input.dependencies = vec![prev.clone()];
                }
            }
            ids.push(store.create(input).unwrap().id);
        }
        store
    })
}

proptest! {
    #[test]
    fn diff_against_self_is_empty(store in arbitrary_store()) {
        let snapshot = store.snapshot();
        prop_assert!(diff(&snapshot, &snapshot).is_empty());
    }

    #[test]
    fn diff_from_empty_adds_everything(store in arbitrary_store()) {
        let report = diff(&Snapshot::empty(), &store.snapshot());
        prop_assert_eq!(report.records.len(), store.len());
        let all_added = report
            .records
            .iter()
            .all(|r| matches!(r, ChangeRecord::Added { .. }));
        prop_assert!(all_added);
    }

    #[test]
    fn record_order_is_category_then_id(mut store in arbitrary_store()) {
        let before = store.snapshot();

        // complete whatever is currently completable
        let ready: Vec<TaskId> = store
            .all()
            .iter()
            .filter(|t| t.dependencies.is_empty() && !t.status.is_terminal())
            .map(|t| t.id.clone())
            .collect();
        for id in &ready {
            complete(&mut store, id);
        }

        let report = diff(&before, &store.snapshot());
        let rank = |r: &ChangeRecord| match r {
            ChangeRecord::Added { .. } => 0,
            ChangeRecord::Updated { .. } => 1,
            ChangeRecord::Completed { .. } => 2,
            ChangeRecord::Deleted { .. } => 3,
            ChangeRecord::HierarchyChanged { .. } => 4,
        };
        for pair in report.records.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(rank(a) < rank(b) || (rank(a) == rank(b) && a.task_id() <= b.task_id()));
        }
    }
}
