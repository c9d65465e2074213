//! Mermaid dependency-graph renderer.
//!
//! Generates a text flowchart of the task DAG, suitable for embedding in
//! Markdown documentation, GitHub, wikis, and other platforms.
//!
//! ## Example Output
//!
//! ```text
//! flowchart TD
//!     T1["T-1 Run simulations"]:::critical
//!     T2["T-2 Analyze results"]:::critical
//!     T1 --> T2
//!     classDef critical stroke:#d33,stroke-width:2px
//! ```

use dagr_core::Project;
use dagr_solver::Analysis;
use std::fmt::Write;

/// Mermaid flowchart renderer.
#[derive(Clone, Debug)]
pub struct MermaidRenderer {
    /// Whether to mark critical-path tasks.
    pub show_critical: bool,
    /// Whether to dim completed tasks.
    pub show_done: bool,
    /// Flow direction (`TD` or `LR`).
    pub direction: String,
}

impl Default for MermaidRenderer {
    fn default() -> Self {
        Self {
            show_critical: true,
            show_done: true,
            direction: "TD".into(),
        }
    }
}

impl MermaidRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Left-to-right layout instead of top-down.
    pub fn left_to_right(mut self) -> Self {
        self.direction = "LR".into();
        self
    }

    /// Disable critical-path highlighting.
    pub fn no_critical(mut self) -> Self {
        self.show_critical = false;
        self
    }

    pub fn render(&self, project: &Project, analysis: &Analysis) -> String {
        let mut out = String::new();
        writeln!(out, "flowchart {}", self.direction).unwrap();

        for (idx, task) in project.tasks().iter().enumerate() {
            let cpm = &analysis.cpm.tasks[idx];
            let label = Self::sanitize_name(&format!("{} {}", task.id, task.name));
            let class = if task.status.is_done() && self.show_done {
                ":::done"
            } else if cpm.critical && self.show_critical {
                ":::critical"
            } else if task.flexible {
                ":::flexible"
            } else if task.background {
                ":::background"
            } else {
                ""
            };
            writeln!(out, "    {}[\"{}\"]{}", Self::make_id(task.id.suffix()), label, class)
                .unwrap();
        }

        writeln!(out).unwrap();
        for task in project.tasks() {
            for dep in &task.depends_on {
                writeln!(
                    out,
                    "    {} --> {}",
                    Self::make_id(dep.suffix()),
                    Self::make_id(task.id.suffix())
                )
                .unwrap();
            }
        }

        writeln!(out).unwrap();
        writeln!(out, "    classDef critical stroke:#d33,stroke-width:2px").unwrap();
        writeln!(out, "    classDef done fill:#eee,color:#999,stroke:#bbb").unwrap();
        writeln!(out, "    classDef flexible stroke-dasharray: 4 3").unwrap();
        writeln!(out, "    classDef background stroke:#36c").unwrap();
        out
    }

    /// Sanitize a label for Mermaid (escape special characters).
    fn sanitize_name(name: &str) -> String {
        name.replace('"', "'")
            .replace('[', "(")
            .replace(']', ")")
            .replace('\n', " ")
            .replace('\r', "")
    }

    /// Node identifier from a task suffix; Mermaid ids must stay
    /// alphanumeric.
    fn make_id(suffix: u32) -> String {
        format!("T{suffix}")
    }
}

/// Render with the default options.
pub fn mermaid_graph(project: &Project, analysis: &Analysis) -> String {
    MermaidRenderer::new().render(project, analysis)
}
