//! The `schedule` command output: the leveled block list as a table and
//! as CSV.

use crate::{fmt_date, fmt_hours, fmt_time};
use dagr_core::Project;
use dagr_solver::{Analysis, Block, Stream};
use std::fmt::Write;

fn flags(project: &Project, analysis: &Analysis, block: &Block) -> String {
    let task = project.get(block.task).expect("block references a task");
    let idx = project.index_of(block.task).unwrap();
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
    if block.stream == Stream::Background {
        flags.push("BG");
    }
    flags.join(" ")
}

fn visible<'a>(
    project: &'a Project,
    analysis: &'a Analysis,
    remaining: bool,
) -> impl Iterator<Item = &'a Block> {
    analysis.leveled.blocks.iter().filter(move |b| {
        !remaining
            || project
                .get(b.task)
                .map_or(true, |t| !t.status.is_done())
    })
}

/// Chronological block table; `remaining` hides finished history.
pub fn schedule_table(project: &Project, analysis: &Analysis, remaining: bool) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "{:<12} {:<13} {:<6} {:<32} {:>6}  {}",
        "DATE", "SPAN", "ID", "TASK", "HOURS", "FLAGS"
    )
    .unwrap();

    let mut last_date = None;
    for block in visible(project, analysis, remaining) {
        let task = project.get(block.task).expect("block references a task");
        let date = block.start.date();
        let date_cell = if last_date == Some(date) {
            String::new()
        } else {
            fmt_date(date)
        };
        last_date = Some(date);

        let span = if block.hours == 0.0 {
            format!("{} --", fmt_time(block.start))
        } else {
            format!("{}-{}", fmt_time(block.start), fmt_time(block.end))
        };

        writeln!(
            out,
            "{:<12} {:<13} {:<6} {:<32} {:>6}  {}",
            date_cell,
            span,
            block.task.to_string(),
            truncate(&task.name, 32),
            fmt_hours(block.hours),
            flags(project, analysis, block),
        )
        .unwrap();
    }

    if let Some(done_at) = analysis.leveled.projected_completion {
        writeln!(out).unwrap();
        writeln!(out, "Projected completion: {}", crate::fmt_dt(done_at)).unwrap();
    }
    out
}

/// Machine-readable form of the same blocks.
pub fn schedule_csv(project: &Project, analysis: &Analysis, remaining: bool) -> String {
    let mut out = String::from("date,start,end,task_id,task,stream,hours,flags\n");
    for block in visible(project, analysis, remaining) {
        let task = project.get(block.task).expect("block references a task");
        let stream = match block.stream {
            Stream::Attended => "attended",
            Stream::Background => "background",
        };
        writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            fmt_date(block.start.date()),
            fmt_time(block.start),
            fmt_time(block.end),
            block.task,
            csv_escape(&task.name),
            stream,
            fmt_hours(block.hours),
            flags(project, analysis, block).replace(' ', "+"),
        )
        .unwrap();
    }
    out
}

fn truncate(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        name.to_string()
    } else {
        let head: String = name.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
