//! # dagr-core
//!
//! Core domain model for the DAGr task-graph planner.
//!
//! This crate provides:
//! - Value types: [`TaskId`], [`Task`], [`TaskStatus`], [`ProjectConfig`]
//! - The [`Project`] aggregate with its mutating operations
//! - The shared [`Error`] enum and non-fatal [`Warning`]s
//!
//! ## Example
//!
//! ```rust
//! use dagr_core::{Project, ProjectConfig, TaskDraft};
//!
//! let mut project = Project::new(ProjectConfig::default());
//! let (design, _) = project
//!     .add_task(TaskDraft::new("Design", 5.0))
//!     .unwrap();
//! let (_, _) = project
//!     .add_task(TaskDraft::new("Implement", 10.0).depends_on(design))
//!     .unwrap();
//! assert_eq!(project.tasks().len(), 2);
//! ```

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod project;

pub use project::{MergeOp, Project, TaskDraft, TaskPatch};

// ============================================================================
// Task Identity
// ============================================================================

/// Task identifier of the form `T-<n>`, `n >= 1`.
///
/// Ids are stable across mutations and cheap to copy; the numeric suffix
/// doubles as the deterministic tie-breaker throughout the engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u32);

impl TaskId {
    pub fn new(suffix: u32) -> Self {
        Self(suffix)
    }

    /// The numeric suffix `n` of `T-<n>`.
    pub fn suffix(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T-{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let suffix = s
            .strip_prefix("T-")
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|&n| n >= 1)
            .ok_or_else(|| Error::InvalidField {
                field: "id",
                reason: format!("'{s}' is not of the form T-<n> with n >= 1"),
            })?;
        Ok(Self(suffix))
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Project Configuration
// ============================================================================

/// Working-calendar configuration for a project.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectConfig {
    /// Wall-clock anchor for scheduling.
    pub start: NaiveDateTime,
    /// Default working-hour capacity per day.
    pub hours_per_day: f64,
    /// Time-of-day when the working day begins.
    pub day_start: NaiveTime,
    /// Whether Saturday and Sunday default to zero capacity.
    pub skip_weekends: bool,
    /// Per-date capacity overrides. An override fully replaces both the
    /// default capacity and the weekend-skip decision for that date.
    pub capacity_overrides: BTreeMap<NaiveDate, f64>,
}

impl ProjectConfig {
    pub const DEFAULT_HOURS_PER_DAY: f64 = 8.0;

    /// Create a configuration anchored at `day_start` on `start_date`,
    /// with the default 8h/day, 09:00 day start, and weekends skipped.
    pub fn new(start_date: NaiveDate) -> Self {
        let day_start = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        Self {
            start: start_date.and_time(day_start),
            hours_per_day: Self::DEFAULT_HOURS_PER_DAY,
            day_start,
            skip_weekends: true,
            capacity_overrides: BTreeMap::new(),
        }
    }

    /// Set a per-date capacity override (builder pattern).
    pub fn with_override(mut self, date: NaiveDate, hours: f64) -> Self {
        self.capacity_overrides.insert(date, hours);
        self
    }

    /// Validate the configuration fields.
    pub fn validate(&self) -> Result<()> {
        if !(self.hours_per_day > 0.0) || !self.hours_per_day.is_finite() {
            return Err(Error::InvalidField {
                field: "hours_per_day",
                reason: format!("must be a positive number, got {}", self.hours_per_day),
            });
        }
        for (date, hours) in &self.capacity_overrides {
            if !(*hours >= 0.0) || !hours.is_finite() {
                return Err(Error::InvalidField {
                    field: "capacity_overrides",
                    reason: format!("capacity for {date} must be >= 0, got {hours}"),
                });
            }
        }
        Ok(())
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self::new(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap())
    }
}

// ============================================================================
// Task
// ============================================================================

/// Lifecycle state of a task.
///
/// The status/timestamp invariants are structural: a task cannot be done
/// without a finish instant, and a reset task carries no actuals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    NotStarted,
    InProgress {
        started_at: NaiveDateTime,
    },
    Done {
        started_at: Option<NaiveDateTime>,
        finished_at: NaiveDateTime,
    },
}

impl TaskStatus {
    pub fn is_not_started(&self) -> bool {
        matches!(self, Self::NotStarted)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress { .. })
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    /// The wire/CLI literal for this status.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress { .. } => "in_progress",
            Self::Done { .. } => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "Not Started"),
            Self::InProgress { .. } => write!(f, "In Progress"),
            Self::Done { .. } => write!(f, "Done"),
        }
    }
}

/// Target state for a generic status change (`set-status`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    NotStarted,
    InProgress,
    Done,
}

impl FromStr for StatusKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            other => Err(Error::InvalidField {
                field: "status",
                reason: format!("'{other}' is not one of not_started, in_progress, done"),
            }),
        }
    }
}

/// A schedulable unit of work.
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    /// Stable identifier, unique within the project.
    pub id: TaskId,
    /// Human-readable name (non-empty).
    pub name: String,
    /// Estimated working hours (>= 0; zero marks a milestone).
    pub duration_hours: f64,
    /// Prerequisite task ids.
    pub depends_on: BTreeSet<TaskId>,
    /// Optional deadline, interpreted as end-of-working-day on that date.
    pub deadline: Option<NaiveDate>,
    /// Optional earliest-start floor, interpreted as that day's start.
    pub proposed_start: Option<NaiveDate>,
    /// Background tasks run unattended in a parallel stream.
    pub background: bool,
    /// Flexible tasks neither constrain nor consume the primary schedule.
    pub flexible: bool,
    /// Free-form project label, for filtering only.
    pub project: String,
    /// Tags consumed by the dopamine-menu bucketing.
    pub tags: BTreeSet<String>,
    /// Free text.
    pub notes: String,
    /// Lifecycle state with actual timestamps.
    pub status: TaskStatus,
}

impl Task {
    /// When work actually began, if recorded.
    pub fn actual_start(&self) -> Option<NaiveDateTime> {
        match self.status {
            TaskStatus::NotStarted => None,
            TaskStatus::InProgress { started_at } => Some(started_at),
            TaskStatus::Done { started_at, .. } => started_at,
        }
    }

    /// When work actually completed, if recorded.
    pub fn actual_finish(&self) -> Option<NaiveDateTime> {
        match self.status {
            TaskStatus::Done { finished_at, .. } => Some(finished_at),
            _ => None,
        }
    }

    /// A zero-duration task is a milestone and schedules at an instant.
    pub fn is_milestone(&self) -> bool {
        self.duration_hours == 0.0
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

// ============================================================================
// Warnings
// ============================================================================

/// Non-fatal findings reported alongside successful operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// `done` was recorded while some dependencies were still open.
    DoneWithOpenDeps { task: TaskId, open: Vec<TaskId> },
    /// `done` without a prior `start`; actual-time measurement is lost.
    DoneWithoutStart { task: TaskId },
    /// A flexible task has non-flexible dependents; the chain is inert
    /// because dependents ignore flexible ancestors.
    FlexibleBlocksOthers {
        flexible: TaskId,
        dependents: Vec<TaskId>,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DoneWithOpenDeps { task, open } => {
                write!(f, "{task} marked done while {} still open", join_ids(open))
            }
            Self::DoneWithoutStart { task } => {
                write!(f, "{task} marked done without a prior start; no actual start recorded")
            }
            Self::FlexibleBlocksOthers { flexible, dependents } => {
                write!(
                    f,
                    "flexible task {flexible} is a dependency of {}; dependents will not wait for it",
                    join_ids(dependents)
                )
            }
        }
    }
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Errors
// ============================================================================

/// Maximum number of calendar days any horizon search may walk before
/// giving up with [`Error::UnschedulableHorizon`].
pub const HORIZON_BOUND_DAYS: u32 = 10_000;

/// Error taxonomy shared by every DAGr crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("dependency cycle: {}", join_ids(.0))]
    CycleDetected(Vec<TaskId>),

    #[error("import reference '{0}' matches no task id or batch entry name")]
    UnresolvedReference(String),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("no project state found; run 'dagr init' first")]
    StateNotInitialized,

    #[error("no working capacity within {HORIZON_BOUND_DAYS} days; check capacity overrides")]
    UnschedulableHorizon,

    #[error("cannot change status from {from} to {to}: {reason}")]
    StatusTransition {
        from: &'static str,
        to: &'static str,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
