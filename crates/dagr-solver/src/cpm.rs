//! Critical Path Method over working-hour offsets.
//!
//! # Algorithm
//!
//! 1. Forward pass in topological order: ES/EF from dependency finishes,
//!    `proposed_start` floors, and recorded actuals.
//! 2. Backward pass in reverse order: LS/LF from the project horizon,
//!    capped by per-task deadlines so competing deadlines surface their
//!    own critical chains.
//! 3. Slack = LS - ES. Negative slack means LATE; critical is slack <= 0.
//!
//! Flexible tasks get their own ES/EF for display but are invisible to
//! everyone else: dependents ignore their finishes, the horizon excludes
//! them, and their slack is reported as infinite.

use crate::calendar::{WorkCalendar, EPS};
use crate::dag::DepGraph;
use chrono::NaiveDateTime;
use dagr_core::{Project, Result, TaskId, TaskStatus};
use tracing::debug;

/// CPM result for a single task, in working-hour offsets plus their
/// wall-clock equivalents.
#[derive(Clone, Debug)]
pub struct CpmTask {
    pub id: TaskId,
    /// Early start offset.
    pub es: f64,
    /// Early finish offset.
    pub ef: f64,
    /// Late start offset; negative when the task is already late.
    pub ls: f64,
    /// Late finish offset.
    pub lf: f64,
    /// `ls - es`; `f64::INFINITY` for flexible tasks.
    pub slack: f64,
    pub critical: bool,
    pub start_at: NaiveDateTime,
    pub finish_at: NaiveDateTime,
    pub late_start_at: NaiveDateTime,
    pub late_finish_at: NaiveDateTime,
}

impl CpmTask {
    /// Slack below zero: the task cannot meet its constraint any more.
    pub fn is_late(&self) -> bool {
        self.slack.is_finite() && self.slack < -EPS
    }
}

/// Complete CPM schedule, arena-indexed like the project's task list.
#[derive(Debug)]
pub struct CpmSchedule {
    pub tasks: Vec<CpmTask>,
    /// Max early finish over non-flexible tasks.
    pub horizon: f64,
    pub horizon_at: NaiveDateTime,
    /// Critical task ids in topological order.
    pub critical_path: Vec<TaskId>,
}

impl CpmSchedule {
    pub fn get(&self, project: &Project, id: TaskId) -> Option<&CpmTask> {
        project.index_of(id).map(|i| &self.tasks[i])
    }
}

/// Run both CPM passes for a project.
pub fn solve(
    project: &Project,
    calendar: &WorkCalendar,
    graph: &DepGraph,
) -> Result<CpmSchedule> {
    let tasks = project.tasks();
    let n = tasks.len();
    let mut es = vec![0.0f64; n];
    let mut ef = vec![0.0f64; n];

    // ── Forward pass ────────────────────────────────────────────────────
    for &idx in graph.topological_order() {
        let task = &tasks[idx];

        let base_ready = graph
            .predecessors(idx)
            .iter()
            .filter(|&&p| !tasks[p].flexible)
            .map(|&p| ef[p])
            .fold(0.0, f64::max);

        let floor = match task.proposed_start {
            Some(date) => calendar.floor_offset(date)?,
            None => 0.0,
        };

        let mut early_start = base_ready.max(floor);
        let early_finish = match task.status {
            TaskStatus::Done { finished_at, .. } => {
                // A finished task never pushes downstream work later than
                // its real completion.
                let actual = calendar.elapsed_hours(finished_at)?;
                early_start = early_start.min(actual);
                actual
            }
            TaskStatus::InProgress { started_at } => {
                early_start = calendar.elapsed_hours(started_at)?;
                early_start + task.duration_hours
            }
            TaskStatus::NotStarted => early_start + task.duration_hours,
        };

        es[idx] = early_start;
        ef[idx] = early_finish;
    }

    let horizon = (0..n)
        .filter(|&i| !tasks[i].flexible)
        .map(|i| ef[i])
        .fold(0.0, f64::max);

    // ── Backward pass ───────────────────────────────────────────────────
    let mut ls = vec![0.0f64; n];
    let mut lf = vec![0.0f64; n];

    for idx in graph.reverse_topological_order() {
        let task = &tasks[idx];
        let deadline_cap = match task.deadline {
            Some(date) => calendar.end_of_day_elapsed(date)?,
            None => f64::INFINITY,
        };

        let late_finish = if task.flexible {
            deadline_cap.min(horizon.max(ef[idx]))
        } else {
            let succ_ls = graph
                .successors(idx)
                .iter()
                .filter(|&&s| !tasks[s].flexible)
                .map(|&s| ls[s])
                .fold(f64::INFINITY, f64::min);
            let base = if succ_ls.is_finite() { succ_ls } else { horizon };
            deadline_cap.min(base)
        };

        lf[idx] = late_finish;
        ls[idx] = late_finish - task.duration_hours;
    }

    // ── Slack, criticality, wall-clock views ────────────────────────────
    let mut out = Vec::with_capacity(n);
    let mut critical_path = Vec::new();
    for idx in 0..n {
        let task = &tasks[idx];
        let deadline_cap = match task.deadline {
            Some(date) => calendar.end_of_day_elapsed(date)?,
            None => f64::INFINITY,
        };

        let (slack, critical) = if task.flexible {
            (f64::INFINITY, false)
        } else if task.status.is_done() {
            // Rendered as a dash downstream; critical only when the actual
            // finish already breached the task's own deadline.
            (0.0, ef[idx] > deadline_cap + EPS)
        } else {
            let slack = ls[idx] - es[idx];
            (slack, slack <= EPS)
        };

        let (start_at, finish_at) = match task.status {
            TaskStatus::Done { started_at, finished_at } => (
                started_at.unwrap_or(finished_at),
                finished_at,
            ),
            TaskStatus::InProgress { started_at } => {
                (started_at, calendar.instant_after(ef[idx])?)
            }
            TaskStatus::NotStarted => {
                let start_at = calendar.start_instant(es[idx])?;
                let finish_at = calendar.instant_after(ef[idx])?.max(start_at);
                (start_at, finish_at)
            }
        };

        out.push(CpmTask {
            id: task.id,
            es: es[idx],
            ef: ef[idx],
            ls: ls[idx],
            lf: lf[idx],
            slack,
            critical,
            start_at,
            finish_at,
            late_start_at: calendar.start_instant(ls[idx].max(0.0))?,
            late_finish_at: calendar.instant_after(lf[idx].max(0.0))?,
        });
    }
    for &idx in graph.topological_order() {
        if out[idx].critical {
            critical_path.push(tasks[idx].id);
        }
    }

    debug!(horizon, critical = critical_path.len(), "cpm solved");

    Ok(CpmSchedule {
        tasks: out,
        horizon,
        horizon_at: calendar.instant_after(horizon)?,
        critical_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dagr_core::{ProjectConfig, TaskDraft};
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn solve_project(project: &Project) -> CpmSchedule {
        let calendar = WorkCalendar::new(&project.config);
        let graph = DepGraph::build(project).unwrap();
        solve(project, &calendar, &graph).unwrap()
    }

    fn monday_project() -> Project {
        // 2026-02-23 is a Monday; 8h/day, weekends skipped.
        Project::new(ProjectConfig::new(date(2026, 2, 23)))
    }

    #[test]
    fn single_task_is_critical() {
        let mut project = monday_project();
        let (a, _) = project.add_task(TaskDraft::new("only", 5.0)).unwrap();
        let schedule = solve_project(&project);

        let t = schedule.get(&project, a).unwrap();
        assert_eq!(t.es, 0.0);
        assert_eq!(t.ef, 5.0);
        assert_eq!(t.slack, 0.0);
        assert!(t.critical);
        assert_eq!(schedule.horizon, 5.0);
    }

    #[test]
    fn deadline_pulls_slack_upstream() {
        // A(4h) -> B(4h), deadline on B at the end of day one.
        let mut project = monday_project();
        let (a, _) = project.add_task(TaskDraft::new("A", 4.0)).unwrap();
        let (b, _) = project
            .add_task(TaskDraft::new("B", 4.0).depends_on(a).deadline(date(2026, 2, 23)))
            .unwrap();
        let schedule = solve_project(&project);

        let ta = schedule.get(&project, a).unwrap();
        assert_eq!(ta.ls, 0.0);
        assert_eq!(ta.lf, 4.0);
        assert_eq!(ta.slack, 0.0);
        assert!(ta.critical, "the deadline makes A critical");
        assert!(schedule.get(&project, b).unwrap().critical);
    }

    #[test]
    fn missed_deadline_goes_negative() {
        // A(5h) -> B(5h), deadline on B at 8h from start.
        let mut project = monday_project();
        let (a, _) = project.add_task(TaskDraft::new("A", 5.0)).unwrap();
        let (b, _) = project
            .add_task(TaskDraft::new("B", 5.0).depends_on(a).deadline(date(2026, 2, 23)))
            .unwrap();
        let schedule = solve_project(&project);

        let ta = schedule.get(&project, a).unwrap();
        let tb = schedule.get(&project, b).unwrap();
        assert!((tb.slack - -2.0).abs() < 1e-9);
        assert!((ta.slack - -2.0).abs() < 1e-9);
        assert!(ta.is_late() && tb.is_late());
        assert!(ta.critical && tb.critical);
    }

    #[test]
    fn proposed_start_floors_es() {
        let mut project = monday_project();
        let (a, _) = project
            .add_task(TaskDraft::new("later", 2.0).proposed_start(date(2026, 2, 25)))
            .unwrap();
        let schedule = solve_project(&project);

        let t = schedule.get(&project, a).unwrap();
        assert_eq!(t.es, 16.0, "floored at Wednesday's start");
        assert_eq!(t.ef, 18.0);
    }

    #[test]
    fn milestone_schedules_at_an_instant() {
        let mut project = monday_project();
        let (a, _) = project.add_task(TaskDraft::new("work", 8.0)).unwrap();
        let (m, _) = project
            .add_task(TaskDraft::new("gate", 0.0).depends_on(a))
            .unwrap();
        let schedule = solve_project(&project);

        let gate = schedule.get(&project, m).unwrap();
        assert_eq!(gate.es, 8.0);
        assert_eq!(gate.ef, 8.0);
        assert_eq!(gate.start_at, gate.finish_at);
        assert_eq!(
            gate.start_at,
            date(2026, 2, 24).and_hms_opt(9, 0, 0).unwrap(),
            "a day-boundary milestone rolls to the next working morning"
        );
    }

    #[test]
    fn done_task_uses_actual_finish_downstream() {
        let mut project = monday_project();
        let (a, _) = project.add_task(TaskDraft::new("head", 8.0)).unwrap();
        let (b, _) = project.add_task(TaskDraft::new("tail", 2.0).depends_on(a)).unwrap();
        // Finished three working hours in, well before the 8h estimate.
        project
            .start_task(a, date(2026, 2, 23).and_hms_opt(9, 0, 0).unwrap())
            .unwrap();
        project
            .finish_task(a, date(2026, 2, 23).and_hms_opt(12, 0, 0).unwrap())
            .unwrap();

        let schedule = solve_project(&project);
        assert_eq!(schedule.get(&project, a).unwrap().ef, 3.0);
        assert_eq!(schedule.get(&project, b).unwrap().es, 3.0);
    }

    #[test]
    fn in_progress_keeps_full_duration_remaining() {
        let mut project = monday_project();
        let (a, _) = project.add_task(TaskDraft::new("going", 6.0)).unwrap();
        project
            .start_task(a, date(2026, 2, 23).and_hms_opt(11, 0, 0).unwrap())
            .unwrap();

        let schedule = solve_project(&project);
        let t = schedule.get(&project, a).unwrap();
        assert_eq!(t.es, 2.0);
        assert_eq!(t.ef, 8.0);
    }

    #[test]
    fn flexible_task_has_infinite_slack_and_blocks_nobody() {
        let mut project = monday_project();
        let (side, _) = project
            .add_task(TaskDraft::new("side quest", 4.0).flexible())
            .unwrap();
        let (main, _) = project
            .add_task(TaskDraft::new("main", 2.0).depends_on(side))
            .unwrap();
        let schedule = solve_project(&project);

        let flex = schedule.get(&project, side).unwrap();
        assert!(flex.slack.is_infinite());
        assert!(!flex.critical);

        let dependent = schedule.get(&project, main).unwrap();
        assert_eq!(dependent.es, 0.0, "flexible ancestors are non-blocking");
        assert_eq!(schedule.horizon, 2.0, "horizon excludes flexible work");
    }

    #[test]
    fn critical_path_lists_topologically() {
        let mut project = monday_project();
        let (a, _) = project.add_task(TaskDraft::new("A", 4.0)).unwrap();
        let (b, _) = project.add_task(TaskDraft::new("B", 4.0).depends_on(a)).unwrap();
        let (_, _) = project.add_task(TaskDraft::new("padding", 1.0)).unwrap();
        let schedule = solve_project(&project);

        assert_eq!(schedule.critical_path, vec![a, b]);
    }
}
