use std::collections::BTreeMap;

use anyhow::anyhow;

use crate::algorithms::{compute_levels, detect_cycle};
use crate::error::{ApiErrorDetails, LibError, Result};
use crate::layout::compute_layout;
use crate::models::{Position, Task, TaskId, TaskLink};

/// Result of a successful arrange computation over a graph snapshot.
#[derive(Debug, Clone)]
pub struct ArrangePlan {
    pub levels: BTreeMap<TaskId, u32>,
    pub positions: BTreeMap<TaskId, Position>,
}

/// Sequences the arrange pass over an in-memory snapshot: cycle check first
/// (fail fast, nothing computed past it), then leveling, then layout.
///
/// A detected cycle aborts the whole pass with a `task_cycle` error carrying
/// the offending path; leveling is never reached.
pub fn plan_arrangement(nodes: &[TaskId], links: &[TaskLink]) -> Result<ArrangePlan> {
    if let Some(path) = detect_cycle(nodes, links) {
        let display = path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(LibError::conflict_with_details(
            "task_cycle",
            "Tasks contain a dependency cycle",
            ApiErrorDetails::CycleDetected { path },
            anyhow!("dependency cycle: {display}"),
        ));
    }

    let levels = compute_levels(nodes, links);
    let positions = compute_layout(&levels);
    Ok(ArrangePlan { levels, positions })
}

/// Merges computed positions into the task snapshot. Only `x` and `y`
/// change; every other field is left untouched.
pub fn apply_positions(tasks: &mut [Task], positions: &BTreeMap<TaskId, Position>) {
    for task in tasks {
        if let Some(position) = positions.get(&task.id) {
            task.x = Some(position.x);
            task.y = Some(position.y);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::{apply_positions, plan_arrangement};
    use crate::error::ApiErrorDetails;
    use crate::models::{GraphId, LinkId, Task, TaskId, TaskLink, TaskStatus};

    fn id(n: u128) -> TaskId {
        TaskId(Uuid::from_u128(n))
    }

    fn link(source: TaskId, target: TaskId) -> TaskLink {
        TaskLink {
            id: LinkId(Uuid::new_v4()),
            graph_id: GraphId(Uuid::from_u128(7)),
            source,
            target,
        }
    }

    fn task(task_id: TaskId, title: &str) -> Task {
        let now = NaiveDate::from_ymd_opt(2026, 1, 1)
            .expect("valid date")
            .and_hms_opt(0, 0, 0)
            .expect("valid datetime");
        Task {
            id: task_id,
            graph_id: GraphId(Uuid::from_u128(7)),
            workflow_id: None,
            title: title.to_string(),
            description: String::new(),
            status: TaskStatus::Pending,
            background_color: "#ffffff".to_string(),
            foreground_color: "#000000".to_string(),
            assigned_to: None,
            assigned_by: None,
            created_by: "board-test".to_string(),
            updated_by: None,
            x: Some(5.0),
            y: Some(5.0),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn chain_plan_places_each_level_on_the_centerline() {
        let (a, b, c) = (id(1), id(2), id(3));
        let plan = plan_arrangement(&[a, b, c], &[link(a, b), link(b, c)])
            .expect("acyclic snapshot should arrange");

        assert_eq!(plan.levels[&a], 0);
        assert_eq!(plan.levels[&c], 2);
        assert_eq!(plan.positions[&a].x, 100.0);
        assert_eq!(plan.positions[&a].y, 100.0);
        assert_eq!(plan.positions[&b].y, 380.0);
        assert_eq!(plan.positions[&c].y, 660.0);
    }

    #[test]
    fn cycle_aborts_before_leveling() {
        let (a, b) = (id(1), id(2));
        let err = plan_arrangement(&[a, b], &[link(a, b), link(b, a)])
            .expect_err("cycle should abort the pass");

        assert_eq!(err.code, "task_cycle");
        let Some(ApiErrorDetails::CycleDetected { path }) = err.details else {
            panic!("cycle error should carry the offending path");
        };
        assert_eq!(path.first(), path.last());
        assert!(path.contains(&a));
        assert!(path.contains(&b));
    }

    #[test]
    fn empty_snapshot_yields_an_empty_plan() {
        let plan = plan_arrangement(&[], &[]).expect("empty snapshot is fine");
        assert!(plan.levels.is_empty());
        assert!(plan.positions.is_empty());
    }

    #[test]
    fn apply_positions_touches_only_coordinates() {
        let (a, b) = (id(1), id(2));
        let mut tasks = vec![task(a, "first"), task(b, "second")];
        let plan =
            plan_arrangement(&[a, b], &[link(a, b)]).expect("acyclic snapshot should arrange");

        apply_positions(&mut tasks, &plan.positions);

        assert_eq!(tasks[0].x, Some(100.0));
        assert_eq!(tasks[0].y, Some(100.0));
        assert_eq!(tasks[1].x, Some(100.0));
        assert_eq!(tasks[1].y, Some(380.0));
        assert_eq!(tasks[0].title, "first");
        assert_eq!(tasks[1].status, TaskStatus::Pending);
    }

    #[test]
    fn every_snapshot_task_gets_a_position() {
        let ids: Vec<TaskId> = (1..=5).map(id).collect();
        let links = [link(ids[0], ids[1]), link(ids[0], ids[2])];
        let plan = plan_arrangement(&ids, &links).expect("acyclic snapshot should arrange");
        assert_eq!(plan.positions.len(), ids.len());
        assert_eq!(plan.levels.len(), ids.len());
    }
}
