//! # dagr-solver
//!
//! Scheduling engines for the DAGr planner.
//!
//! This crate provides:
//! - Working-calendar arithmetic between wall-clock moments and elapsed
//!   working hours ([`calendar`])
//! - Dependency-graph views with deterministic ordering ([`dag`])
//! - Critical Path Method with deadline back-propagation ([`cpm`])
//! - Single-resource leveling into attended/background streams
//!   ([`leveling`])
//! - Next-task, dopamine-menu and at-risk selection ([`selector`])
//!
//! Every engine is a pure function of the project state it is given;
//! re-running any of them yields identical results.
//!
//! ## Example
//!
//! ```rust
//! use dagr_core::{Project, ProjectConfig, TaskDraft};
//! use dagr_solver::Analysis;
//!
//! let mut project = Project::new(ProjectConfig::default());
//! let (a, _) = project.add_task(TaskDraft::new("plan", 4.0)).unwrap();
//! project
//!     .add_task(TaskDraft::new("build", 8.0).depends_on(a))
//!     .unwrap();
//!
//! let analysis = Analysis::run(&project, project.config.start).unwrap();
//! assert_eq!(analysis.cpm.critical_path.len(), 2);
//! ```

use chrono::NaiveDateTime;
use dagr_core::{Project, Result};

pub mod calendar;
pub mod cpm;
pub mod dag;
pub mod leveling;
pub mod selector;

pub use calendar::WorkCalendar;
pub use cpm::{CpmSchedule, CpmTask};
pub use dag::DepGraph;
pub use leveling::{Block, DayPlan, LeveledSchedule, Stream};
pub use selector::{at_risk_tasks, dopamine_menu, next_report, AtRiskTask, DopamineMenu, NextReport};

/// The full engine pipeline over one project state: calendar, graph,
/// CPM, and the leveled schedule.
#[derive(Debug)]
pub struct Analysis {
    pub calendar: WorkCalendar,
    pub cpm: CpmSchedule,
    pub leveled: LeveledSchedule,
}

impl Analysis {
    /// Run graph validation, both CPM passes, and the leveler.
    ///
    /// `now` matters only when tasks are in progress; callers without a
    /// live clock (tests, renderers) pass the project start.
    pub fn run(project: &Project, now: NaiveDateTime) -> Result<Self> {
        let calendar = WorkCalendar::new(&project.config);
        let graph = DepGraph::build(project)?;
        let cpm = cpm::solve(project, &calendar, &graph)?;
        let leveled = leveling::level(project, &calendar, &graph, &cpm, now)?;
        Ok(Self {
            calendar,
            cpm,
            leveled,
        })
    }

    pub fn next_report(&self, project: &Project) -> NextReport {
        selector::next_report(project, &self.cpm)
    }

    pub fn at_risk(&self, project: &Project) -> Result<Vec<AtRiskTask>> {
        selector::at_risk_tasks(project, &self.calendar, &self.leveled)
    }
}
