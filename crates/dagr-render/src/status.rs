//! The `status` dashboard and the `next` view.

use crate::{fmt_date, fmt_dt, fmt_hours};
use dagr_core::{Project, TaskId};
use dagr_solver::{Analysis, AtRiskTask, NextReport};
use std::fmt::Write;

pub fn status_dashboard(project: &Project, analysis: &Analysis, risks: &[AtRiskTask]) -> String {
    let tasks = project.tasks();
    let done = tasks.iter().filter(|t| t.status.is_done()).count();
    let in_progress = tasks.iter().filter(|t| t.status.is_in_progress()).count();
    let not_started = tasks.len() - done - in_progress;

    let remaining_hours: f64 = tasks
        .iter()
        .filter(|t| !t.status.is_done() && !t.flexible)
        .map(|t| t.duration_hours)
        .sum();

    let mut out = String::new();
    writeln!(out, "Tasks: {} total", tasks.len()).unwrap();
    writeln!(
        out,
        "  done {done}, in progress {in_progress}, not started {not_started}"
    )
    .unwrap();
    writeln!(out, "Remaining scheduled work: {}h", fmt_hours(remaining_hours)).unwrap();

    if let Some(completion) = analysis.leveled.projected_completion {
        writeln!(out, "Projected completion: {}", fmt_dt(completion)).unwrap();
    }
    writeln!(
        out,
        "Critical now: {}",
        if analysis.cpm.critical_path.is_empty() {
            "(nothing)".to_string()
        } else {
            join_ids(&analysis.cpm.critical_path)
        }
    )
    .unwrap();

    if risks.is_empty() {
        writeln!(out, "At risk: none").unwrap();
    } else {
        writeln!(out, "At risk:").unwrap();
        for risk in risks {
            let name = project.get(risk.id).map(|t| t.name.as_str()).unwrap_or("");
            writeln!(
                out,
                "  {} {} due {} but projected {}",
                risk.id,
                name,
                fmt_date(risk.deadline),
                fmt_dt(risk.projected),
            )
            .unwrap();
        }
    }
    out
}

pub fn next_view(project: &Project, report: &NextReport) -> String {
    let mut out = String::new();

    if !report.in_progress.is_empty() {
        writeln!(out, "In progress:").unwrap();
        for id in &report.in_progress {
            writeln!(out, "  {} {}", id, name_of(project, *id)).unwrap();
        }
    } else if let Some(id) = report.next {
        writeln!(out, "Next up: {} {}", id, name_of(project, id)).unwrap();
    } else {
        writeln!(out, "Next up: nothing ready").unwrap();
    }

    if !report.kickoff_background.is_empty() {
        writeln!(out, "Kick off in the background:").unwrap();
        for id in &report.kickoff_background {
            writeln!(out, "  {} {}", id, name_of(project, *id)).unwrap();
        }
    }

    if !report.menu.is_empty() {
        writeln!(out).unwrap();
        writeln!(out, "Dopamine menu:").unwrap();
        bucket(&mut out, project, "Quick Wins", &report.menu.quick_wins);
        bucket(&mut out, project, "Low Energy", &report.menu.low_energy);
        bucket(&mut out, project, "Hyperfocus", &report.menu.hyperfocus);
        bucket(&mut out, project, "Other Side Quests", &report.menu.side_quests);
    }
    out
}

fn bucket(out: &mut String, project: &Project, title: &str, ids: &[TaskId]) {
    if ids.is_empty() {
        return;
    }
    writeln!(out, "  {title}:").unwrap();
    for id in ids {
        let hours = project
            .get(*id)
            .map(|t| fmt_hours(t.duration_hours))
            .unwrap_or_default();
        writeln!(out, "    {} {} ({}h)", id, name_of(project, *id), hours).unwrap();
    }
}

fn name_of(project: &Project, id: TaskId) -> String {
    project
        .get(id)
        .map(|t| t.name.clone())
        .unwrap_or_default()
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dagr_core::{ProjectConfig, TaskDraft};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn dashboard_summarizes_counts_and_risks() {
        let mut project = Project::new(ProjectConfig::new(date(2026, 2, 23)));
        let (a, _) = project
            .add_task(TaskDraft::new("Tight", 12.0).deadline(date(2026, 2, 23)))
            .unwrap();
        project.add_task(TaskDraft::new("Easy", 1.0)).unwrap();
        let _ = a;
        let analysis = Analysis::run(&project, project.config.start).unwrap();
        let risks = analysis.at_risk(&project).unwrap();

        let dash = status_dashboard(&project, &analysis, &risks);
        assert!(dash.contains("Tasks: 2 total"));
        assert!(dash.contains("Remaining scheduled work: 13h"));
        assert!(dash.contains("At risk:"));
        assert!(dash.contains("T-1 Tight"));
    }

    #[test]
    fn next_view_shows_menu_buckets() {
        let mut project = Project::new(ProjectConfig::new(date(2026, 2, 23)));
        project.add_task(TaskDraft::new("Main work", 4.0)).unwrap();
        project
            .add_task(TaskDraft::new("Tiny", 0.2).flexible())
            .unwrap();
        project
            .add_task(TaskDraft::new("Chill", 1.5).flexible().tag("low-energy"))
            .unwrap();
        let analysis = Analysis::run(&project, project.config.start).unwrap();
        let report = analysis.next_report(&project);

        let view = next_view(&project, &report);
        assert!(view.contains("Next up: T-1 Main work"));
        assert!(view.contains("Quick Wins:"));
        assert!(view.contains("T-2 Tiny (0.2h)"));
        assert!(view.contains("Low Energy:"));
        assert!(view.contains("T-3 Chill (1.5h)"));
    }

    #[test]
    fn in_progress_takes_over_the_headline() {
        let mut project = Project::new(ProjectConfig::new(date(2026, 2, 23)));
        let (a, _) = project.add_task(TaskDraft::new("Underway", 4.0)).unwrap();
        project.add_task(TaskDraft::new("Waiting", 2.0)).unwrap();
        project
            .start_task(a, date(2026, 2, 23).and_hms_opt(9, 0, 0).unwrap())
            .unwrap();
        let analysis = Analysis::run(&project, project.config.start).unwrap();
        let report = analysis.next_report(&project);

        let view = next_view(&project, &report);
        assert!(view.starts_with("In progress:"));
        assert!(view.contains("T-1 Underway"));
        assert!(!view.contains("Next up:"));
    }
}
