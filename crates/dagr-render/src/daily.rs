//! The `today` / `daily` command output: per-day rollups of the leveled
//! schedule.

use crate::{fmt_date, fmt_hours, fmt_time};
use chrono::{Days, NaiveDate};
use dagr_core::Project;
use dagr_solver::{Analysis, Stream};
use std::fmt::Write;

/// Render `count` days starting at `from`. Days without planned work are
/// still listed so a week view reads as a week.
pub fn daily_view(project: &Project, analysis: &Analysis, from: NaiveDate, count: usize) -> String {
    let mut out = String::new();
    let mut date = from;
    for i in 0..count {
        if i > 0 {
            writeln!(out).unwrap();
        }
        render_day(&mut out, project, analysis, date);
        date = match date.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => break,
        };
    }
    out
}

fn render_day(out: &mut String, project: &Project, analysis: &Analysis, date: NaiveDate) {
    let capacity = analysis.calendar.capacity(date);
    writeln!(
        out,
        "{} ({}h capacity)",
        fmt_date(date),
        fmt_hours(capacity)
    )
    .unwrap();

    let Some(day) = analysis.leveled.days.iter().find(|d| d.date == date) else {
        writeln!(out, "  nothing scheduled").unwrap();
        return;
    };

    for &block_idx in &day.blocks {
        let block = &analysis.leveled.blocks[block_idx];
        let task = project.get(block.task).expect("block references a task");
        let idx = project.index_of(block.task).unwrap();
        let cpm = &analysis.cpm.tasks[idx];

        let mut flags = Vec::new();
        if task.status.is_done() {
            flags.push("DONE");
        }
        if cpm.critical {
            flags.push("CRIT");
        }
        if block.stream == Stream::Background {
            flags.push("BG");
        }

        writeln!(
            out,
            "  {}-{}  {:<6} {:<32} {}",
            fmt_time(block.start),
            fmt_time(block.end),
            block.task.to_string(),
            task.name.chars().take(32).collect::<String>(),
            flags.join(" "),
        )
        .unwrap();
    }
    writeln!(
        out,
        "  attended {}h, background {}h",
        fmt_hours(day.attended_hours),
        fmt_hours(day.background_hours)
    )
    .unwrap();
}
