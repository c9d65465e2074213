//! Standalone interactive HTML page: the Mermaid graph plus the CPM
//! summary, rendered client-side by mermaid.js.

use crate::mermaid::mermaid_graph;
use crate::{fmt_dt, fmt_hours, fmt_slack};
use dagr_core::Project;
use dagr_solver::Analysis;
use std::fmt::Write;

const MERMAID_CDN: &str = "https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.min.js";

pub fn html_page(project: &Project, analysis: &Analysis, title: &str) -> String {
    let graph = mermaid_graph(project, analysis);

    let mut rows = String::new();
    for (idx, task) in project.tasks().iter().enumerate() {
        let cpm = &analysis.cpm.tasks[idx];
        let class = if cpm.critical { " class=\"critical\"" } else { "" };
        writeln!(
            rows,
            "      <tr{}><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            class,
            task.id,
            escape(&task.name),
            fmt_hours(task.duration_hours),
            fmt_dt(cpm.start_at),
            fmt_dt(cpm.finish_at),
            fmt_slack(cpm.slack, task.status.is_done()),
        )
        .unwrap();
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <style>
    body {{ font-family: system-ui, sans-serif; margin: 2rem; }}
    table {{ border-collapse: collapse; margin-top: 1.5rem; }}
    th, td {{ border: 1px solid #ccc; padding: 0.3rem 0.7rem; text-align: left; }}
    tr.critical td {{ background: #fff0f0; }}
    pre.mermaid {{ background: transparent; }}
  </style>
</head>
<body>
  <h1>{title}</h1>
  <pre class="mermaid">
{graph}
  </pre>
  <table>
    <thead>
      <tr><th>ID</th><th>Task</th><th>Hours</th><th>Start</th><th>Finish</th><th>Slack</th></tr>
    </thead>
    <tbody>
{rows}    </tbody>
  </table>
  <script src="{cdn}"></script>
  <script>mermaid.initialize({{ startOnLoad: true }});</script>
</body>
</html>
"#,
        title = escape(title),
        graph = graph,
        rows = rows,
        cdn = MERMAID_CDN,
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
