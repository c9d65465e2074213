//! The `list` and `show` command output.

use crate::{fmt_date, fmt_dt, fmt_hours, fmt_slack};
use dagr_core::{Error, Project, Result, TaskId};
use dagr_solver::Analysis;
use std::fmt::Write;

/// Task inventory, optionally filtered by project label.
pub fn list_table(project: &Project, label: Option<&str>) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "{:<6} {:<32} {:>6}  {:<12} {:<10} {}",
        "ID", "NAME", "HRS", "STATUS", "DEPS", "FLAGS"
    )
    .unwrap();
    for task in project.tasks() {
        if let Some(label) = label {
            if task.project != label {
                continue;
            }
        }
        let deps = if task.depends_on.is_empty() {
            "-".to_string()
        } else {
            task.depends_on
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        };
        let mut flags = Vec::new();
        if task.background {
            flags.push("bg");
        }
        if task.flexible {
            flags.push("flex");
        }
        if task.deadline.is_some() {
            flags.push("deadline");
        }
        writeln!(
            out,
            "{:<6} {:<32} {:>6}  {:<12} {:<10} {}",
            task.id.to_string(),
            truncate(&task.name, 32),
            fmt_hours(task.duration_hours),
            task.status.label(),
            deps,
            flags.join(","),
        )
        .unwrap();
    }
    out
}

/// Full detail for one task, including its CPM numbers.
pub fn show_task(project: &Project, analysis: &Analysis, id: TaskId) -> Result<String> {
    let task = project.get(id).ok_or(Error::UnknownTask(id))?;
    let idx = project.index_of(id).ok_or(Error::UnknownTask(id))?;
    let cpm = &analysis.cpm.tasks[idx];

    let mut out = String::new();
    writeln!(out, "{} {}", task.id, task.name).unwrap();
    writeln!(out, "  status:      {}", task.status).unwrap();
    writeln!(out, "  duration:    {}h", fmt_hours(task.duration_hours)).unwrap();
    if !task.depends_on.is_empty() {
        let deps = task
            .depends_on
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(out, "  depends on:  {deps}").unwrap();
    }
    let blockers: Vec<String> = project
        .tasks()
        .iter()
        .filter(|t| t.depends_on.contains(&id))
        .map(|t| t.id.to_string())
        .collect();
    if !blockers.is_empty() {
        writeln!(out, "  blocks:      {}", blockers.join(", ")).unwrap();
    }
    if let Some(deadline) = task.deadline {
        writeln!(out, "  deadline:    {}", fmt_date(deadline)).unwrap();
    }
    if let Some(proposed) = task.proposed_start {
        writeln!(out, "  not before:  {}", fmt_date(proposed)).unwrap();
    }
    if task.background {
        writeln!(out, "  background:  yes").unwrap();
    }
    if task.flexible {
        writeln!(out, "  flexible:    yes").unwrap();
    }
    if !task.project.is_empty() {
        writeln!(out, "  project:     {}", task.project).unwrap();
    }
    if !task.tags.is_empty() {
        let tags = task.tags.iter().cloned().collect::<Vec<_>>().join(", ");
        writeln!(out, "  tags:        {tags}").unwrap();
    }
    if let Some(at) = task.actual_start() {
        writeln!(out, "  started:     {}", fmt_dt(at)).unwrap();
    }
    if let Some(at) = task.actual_finish() {
        writeln!(out, "  finished:    {}", fmt_dt(at)).unwrap();
    }
    writeln!(out, "  schedule:    {} -> {}", fmt_dt(cpm.start_at), fmt_dt(cpm.finish_at)).unwrap();
    writeln!(
        out,
        "  slack:       {}{}",
        fmt_slack(cpm.slack, task.status.is_done()),
        if cpm.critical { "  CRITICAL" } else { "" }
    )
    .unwrap();
    if !task.notes.is_empty() {
        writeln!(out, "  notes:       {}", task.notes).unwrap();
    }
    Ok(out)
}

fn truncate(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        name.to_string()
    } else {
        let head: String = name.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    }
}
