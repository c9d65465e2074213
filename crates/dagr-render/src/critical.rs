//! The `critical-path` command output: the CPM table.

use crate::{fmt_dt, fmt_hours, fmt_slack};
use dagr_core::{Error, Project, Result};
use dagr_solver::Analysis;
use std::fmt::Write;
use std::str::FromStr;

/// Row ordering for the CPM table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CriticalSort {
    /// By early start, then id.
    Chrono,
    /// Dependency-chain order (topological).
    Chain,
}

impl FromStr for CriticalSort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "chrono" => Ok(Self::Chrono),
            "chain" => Ok(Self::Chain),
            other => Err(Error::InvalidField {
                field: "sort",
                reason: format!("'{other}' is not one of chrono, chain"),
            }),
        }
    }
}

pub fn critical_path_table(project: &Project, analysis: &Analysis, sort: CriticalSort) -> String {
    let tasks = project.tasks();
    let mut rows: Vec<usize> = (0..tasks.len()).collect();
    match sort {
        CriticalSort::Chrono => rows.sort_by(|&a, &b| {
            analysis.cpm.tasks[a]
                .es
                .total_cmp(&analysis.cpm.tasks[b].es)
                .then(tasks[a].id.suffix().cmp(&tasks[b].id.suffix()))
        }),
        CriticalSort::Chain => {
            // Tasks are arena-ordered by id; re-walk them in dependency
            // order so each chain reads top to bottom.
            let order = topo_positions(project, analysis);
            rows.sort_by_key(|&i| order[i]);
        }
    }

    let mut out = String::new();
    writeln!(
        out,
        "{:<6} {:<28} {:>5}  {:<17} {:<17} {:>7}  {}",
        "ID", "TASK", "HRS", "ES", "LF", "SLACK", "FLAGS"
    )
    .unwrap();
    for idx in rows {
        let task = &tasks[idx];
        let cpm = &analysis.cpm.tasks[idx];
        let mut flags = Vec::new();
        if task.status.is_done() {
            flags.push("DONE");
        } else if cpm.is_late() {
            flags.push("LATE");
        }
        if cpm.critical {
            flags.push("CRIT");
        }
        if task.flexible {
            flags.push("FLEX");
        }
        if task.background {
            flags.push("BG");
        }
        writeln!(
            out,
            "{:<6} {:<28} {:>5}  {:<17} {:<17} {:>7}  {}",
            task.id.to_string(),
            truncate(&task.name, 28),
            fmt_hours(task.duration_hours),
            fmt_dt(cpm.start_at),
            fmt_dt(cpm.late_finish_at),
            fmt_slack(cpm.slack, task.status.is_done()),
            flags.join(" "),
        )
        .unwrap();
    }

    writeln!(out).unwrap();
    writeln!(
        out,
        "Critical path: {}",
        if analysis.cpm.critical_path.is_empty() {
            "(none)".to_string()
        } else {
            analysis
                .cpm
                .critical_path
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ")
        }
    )
    .unwrap();
    writeln!(out, "Horizon: {}", fmt_dt(analysis.cpm.horizon_at)).unwrap();
    out
}

/// Position of each arena index in a dependency-respecting order.
fn topo_positions(project: &Project, analysis: &Analysis) -> Vec<usize> {
    // The CPM critical path is already topological; reuse ES as the
    // chain key and break ties by walking dependencies before
    // dependents.
    let tasks = project.tasks();
    let mut order: Vec<usize> = (0..tasks.len()).collect();
    order.sort_by(|&a, &b| {
        let (ca, cb) = (&analysis.cpm.tasks[a], &analysis.cpm.tasks[b]);
        ca.es
            .total_cmp(&cb.es)
            .then(ca.ef.total_cmp(&cb.ef))
            .then(tasks[a].id.suffix().cmp(&tasks[b].id.suffix()))
    });
    let mut positions = vec![0; tasks.len()];
    for (pos, &idx) in order.iter().enumerate() {
        positions[idx] = pos;
    }
    positions
}

fn truncate(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        name.to_string()
    } else {
        let head: String = name.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    }
}
