//! Derived "what now?" views: the next attended task, background
//! kickoffs, the dopamine menu for flexible side-quests, and the at-risk
//! list.

use crate::calendar::WorkCalendar;
use crate::cpm::CpmSchedule;
use crate::leveling::LeveledSchedule;
use chrono::{NaiveDate, NaiveDateTime};
use dagr_core::{Project, Result, Task, TaskId};

/// Flexible tasks that are ready, bucketed first-match-wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DopamineMenu {
    /// Under an hour, or tagged `quick`.
    pub quick_wins: Vec<TaskId>,
    /// Tagged `low-energy` or `braindead`.
    pub low_energy: Vec<TaskId>,
    /// Tagged `hyperfocus` or `deep-work`.
    pub hyperfocus: Vec<TaskId>,
    /// Everything else that is ready.
    pub side_quests: Vec<TaskId>,
}

impl DopamineMenu {
    pub fn is_empty(&self) -> bool {
        self.quick_wins.is_empty()
            && self.low_energy.is_empty()
            && self.hyperfocus.is_empty()
            && self.side_quests.is_empty()
    }
}

/// Everything the `next` command reports.
#[derive(Clone, Debug, Default)]
pub struct NextReport {
    /// Tasks currently underway; when non-empty, this is the answer.
    pub in_progress: Vec<TaskId>,
    /// Lowest-slack ready attended task.
    pub next: Option<TaskId>,
    /// Ready background tasks worth kicking off alongside.
    pub kickoff_background: Vec<TaskId>,
    pub menu: DopamineMenu,
}

/// A task whose leveled finish lands past its deadline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtRiskTask {
    pub id: TaskId,
    pub deadline: NaiveDate,
    pub deadline_at: NaiveDateTime,
    pub projected: NaiveDateTime,
}

/// Build the `next` report from the CPM results.
pub fn next_report(project: &Project, cpm: &CpmSchedule) -> NextReport {
    let tasks = project.tasks();

    let mut in_progress: Vec<TaskId> = tasks
        .iter()
        .filter(|t| t.status.is_in_progress())
        .map(|t| t.id)
        .collect();
    in_progress.sort_by_key(|id| id.suffix());

    let mut candidates: Vec<usize> = (0..tasks.len())
        .filter(|&i| {
            let t = &tasks[i];
            !t.flexible && !t.background && t.status.is_not_started() && is_ready(project, t)
        })
        .collect();
    candidates.sort_by(|&a, &b| {
        cpm.tasks[a]
            .slack
            .total_cmp(&cpm.tasks[b].slack)
            .then(cpm.tasks[a].es.total_cmp(&cpm.tasks[b].es))
            .then(tasks[a].id.suffix().cmp(&tasks[b].id.suffix()))
    });
    let next = candidates.first().map(|&i| tasks[i].id);

    let mut kickoff_background: Vec<TaskId> = tasks
        .iter()
        .filter(|t| {
            !t.flexible && t.background && t.status.is_not_started() && is_ready(project, t)
        })
        .map(|t| t.id)
        .collect();
    kickoff_background.sort_by_key(|id| id.suffix());

    NextReport {
        in_progress,
        next,
        kickoff_background,
        menu: dopamine_menu(project),
    }
}

/// Bucket the ready flexible tasks. Rules apply in order, first match
/// wins; each bucket sorts by ascending duration then id.
pub fn dopamine_menu(project: &Project) -> DopamineMenu {
    let mut ready: Vec<&Task> = project
        .tasks()
        .iter()
        .filter(|t| t.flexible && t.status.is_not_started() && is_ready(project, t))
        .collect();
    ready.sort_by(|a, b| {
        a.duration_hours
            .total_cmp(&b.duration_hours)
            .then(a.id.suffix().cmp(&b.id.suffix()))
    });

    let mut menu = DopamineMenu::default();
    for task in ready {
        if task.duration_hours < 1.0 || task.has_tag("quick") {
            menu.quick_wins.push(task.id);
        } else if task.has_tag("low-energy") || task.has_tag("braindead") {
            menu.low_energy.push(task.id);
        } else if task.has_tag("hyperfocus") || task.has_tag("deep-work") {
            menu.hyperfocus.push(task.id);
        } else {
            menu.side_quests.push(task.id);
        }
    }
    menu
}

/// Non-done deadline tasks whose leveled finish exceeds the deadline's
/// end of working day.
pub fn at_risk_tasks(
    project: &Project,
    calendar: &WorkCalendar,
    leveled: &LeveledSchedule,
) -> Result<Vec<AtRiskTask>> {
    let mut out = Vec::new();
    for (idx, task) in project.tasks().iter().enumerate() {
        if task.status.is_done() {
            continue;
        }
        let Some(deadline) = task.deadline else {
            continue;
        };
        let Some(projected) = leveled.finish_at[idx] else {
            continue;
        };
        let deadline_at = calendar.end_of_day_instant(deadline);
        if projected > deadline_at {
            out.push(AtRiskTask {
                id: task.id,
                deadline,
                deadline_at,
                projected,
            });
        }
    }
    out.sort_by_key(|r| (r.deadline, r.id.suffix()));
    Ok(out)
}

/// Dependencies satisfied: every prerequisite that can block this task is
/// done. Flexible prerequisites never block non-flexible work.
fn is_ready(project: &Project, task: &Task) -> bool {
    task.depends_on.iter().all(|dep| {
        project.get(*dep).map_or(true, |d| {
            d.status.is_done() || (!task.flexible && d.flexible)
        })
    })
}
