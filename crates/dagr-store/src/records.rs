//! Wire records for `dagr.json`.
//!
//! Records are the serde-facing shapes; conversion into domain types is
//! where the format is validated. Dates travel as `YYYY-MM-DD`, times of
//! day as `HH:MM`, full datetimes as ISO 8601. Fields this version does
//! not know are captured in flattened maps so they survive a round-trip.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use dagr_core::{Error, ProjectConfig, Result, Task, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// The whole state file: `{"config": ..., "tasks": [...]}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateRecord {
    pub config: ConfigRecord,
    pub tasks: Vec<TaskRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub start_date: NaiveDate,
    pub start_time: String,
    pub hours_per_day: f64,
    pub day_start_time: String,
    pub skip_weekends: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capacity_overrides: BTreeMap<NaiveDate, f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub name: String,
    pub duration_hours: f64,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub background: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub flexible: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_start: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_finish: Option<NaiveDateTime>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigRecord {
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            start_date: config.start.date(),
            start_time: format_time(config.start.time()),
            hours_per_day: config.hours_per_day,
            day_start_time: format_time(config.day_start),
            skip_weekends: config.skip_weekends,
            capacity_overrides: config.capacity_overrides.clone(),
            extra: Map::new(),
        }
    }

    pub fn into_config(self) -> Result<(ProjectConfig, Map<String, Value>)> {
        let start_time = parse_time("start_time", &self.start_time)?;
        let config = ProjectConfig {
            start: self.start_date.and_time(start_time),
            hours_per_day: self.hours_per_day,
            day_start: parse_time("day_start_time", &self.day_start_time)?,
            skip_weekends: self.skip_weekends,
            capacity_overrides: self.capacity_overrides,
        };
        config.validate()?;
        Ok((config, self.extra))
    }
}

impl TaskRecord {
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id.to_string(),
            name: task.name.clone(),
            duration_hours: task.duration_hours,
            depends_on: task.depends_on.iter().map(ToString::to_string).collect(),
            deadline: task.deadline,
            proposed_start: task.proposed_start,
            background: task.background,
            flexible: task.flexible,
            project: task.project.clone(),
            tags: task.tags.clone(),
            notes: task.notes.clone(),
            status: task.status.label().to_string(),
            actual_start: task.actual_start(),
            actual_finish: task.actual_finish(),
            extra: Map::new(),
        }
    }

    pub fn into_task(self) -> Result<(Task, Map<String, Value>)> {
        let id: TaskId = self.id.parse()?;
        let mut depends_on = BTreeSet::new();
        for dep in &self.depends_on {
            depends_on.insert(dep.parse::<TaskId>()?);
        }
        let status = decode_status(id, &self.status, self.actual_start, self.actual_finish)?;
        let task = Task {
            id,
            name: self.name,
            duration_hours: self.duration_hours,
            depends_on,
            deadline: self.deadline,
            proposed_start: self.proposed_start,
            background: self.background,
            flexible: self.flexible,
            project: self.project,
            tags: self.tags,
            notes: self.notes,
            status,
        };
        Ok((task, self.extra))
    }
}

/// Reassemble the status sum type from the wire triple, rejecting
/// combinations the invariants forbid.
fn decode_status(
    id: TaskId,
    label: &str,
    actual_start: Option<NaiveDateTime>,
    actual_finish: Option<NaiveDateTime>,
) -> Result<TaskStatus> {
    match label {
        "not_started" => {
            if actual_start.is_some() || actual_finish.is_some() {
                return Err(Error::InvalidField {
                    field: "status",
                    reason: format!("{id} is not_started but carries actual timestamps"),
                });
            }
            Ok(TaskStatus::NotStarted)
        }
        "in_progress" => {
            let started_at = actual_start.ok_or_else(|| Error::InvalidField {
                field: "actual_start",
                reason: format!("{id} is in_progress without an actual start"),
            })?;
            if actual_finish.is_some() {
                return Err(Error::InvalidField {
                    field: "actual_finish",
                    reason: format!("{id} is in_progress but carries a finish"),
                });
            }
            Ok(TaskStatus::InProgress { started_at })
        }
        "done" => {
            let finished_at = actual_finish.ok_or_else(|| Error::InvalidField {
                field: "actual_finish",
                reason: format!("{id} is done without an actual finish"),
            })?;
            Ok(TaskStatus::Done {
                started_at: actual_start,
                finished_at,
            })
        }
        other => Err(Error::InvalidField {
            field: "status",
            reason: format!("'{other}' is not one of not_started, in_progress, done"),
        }),
    }
}

fn format_time(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

fn parse_time(field: &'static str, s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| Error::InvalidField {
        field,
        reason: format!("'{s}' is not a HH:MM time"),
    })
}
