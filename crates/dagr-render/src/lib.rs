//! # dagr-render
//!
//! Output backends for DAGr: plain-text tables for the terminal, CSV for
//! machines, a Mermaid dependency graph, and a standalone HTML page.
//!
//! Renderers are pure functions from engine results to `String`; equal
//! inputs produce byte-identical output.

use chrono::{NaiveDate, NaiveDateTime};

pub mod critical;
pub mod daily;
pub mod html;
pub mod mermaid;
pub mod schedule;
pub mod status;
pub mod tasks;

pub use critical::{critical_path_table, CriticalSort};
pub use daily::daily_view;
pub use html::html_page;
pub use mermaid::mermaid_graph;
pub use schedule::{schedule_csv, schedule_table};
pub use status::{next_view, status_dashboard};
pub use tasks::{list_table, show_task};

pub(crate) fn fmt_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub(crate) fn fmt_dt(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M").to_string()
}

pub(crate) fn fmt_time(t: NaiveDateTime) -> String {
    t.format("%H:%M").to_string()
}

/// Hours with up to two decimals, trailing zeros trimmed: `8`, `1.5`,
/// `0.25`.
pub(crate) fn fmt_hours(h: f64) -> String {
    let s = format!("{h:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}

/// Slack column: done tasks show a plain dash, flexible tasks "flex",
/// everything else signed hours.
pub(crate) fn fmt_slack(slack: f64, done: bool) -> String {
    if done {
        "-".to_string()
    } else if slack.is_infinite() {
        "flex".to_string()
    } else {
        fmt_hours(slack)
    }
}
