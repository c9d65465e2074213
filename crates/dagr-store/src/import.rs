//! Bulk-import payload: `{"tasks": [...]}`.
//!
//! Dependency entries may name other tasks of the same batch instead of
//! ids, so resolution happens in two phases: first every entry gets its
//! target id (existing id for updates, a fresh or forced id for
//! creations), then dependency strings resolve against existing tasks
//! plus the batch's name table. Only after full resolution does the
//! merge hit the project, atomically.

use chrono::NaiveDate;
use dagr_core::{Error, MergeOp, Project, TaskDraft, TaskId, TaskPatch};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::{Result, StoreError};

#[derive(Clone, Debug, Deserialize)]
pub struct ImportPayload {
    pub tasks: Vec<ImportEntry>,
}

/// One entry of the payload. Absent optional fields mean "leave alone"
/// when the entry updates an existing task, and "default" when it
/// creates one.
#[derive(Clone, Debug, Deserialize)]
pub struct ImportEntry {
    pub name: String,
    pub duration_hrs: f64,
    #[serde(default)]
    pub depends_on: Option<Vec<String>>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub proposed_start: Option<NaiveDate>,
    #[serde(default)]
    pub background: Option<bool>,
    #[serde(default)]
    pub flexible: Option<bool>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub project: Option<String>,
}

pub fn parse_payload(json: &str) -> Result<ImportPayload> {
    Ok(serde_json::from_str(json)?)
}

/// Resolve a payload against the current project into merge operations.
pub fn resolve_payload(project: &Project, payload: &ImportPayload) -> Result<Vec<MergeOp>> {
    // Phase 1: a target id per entry.
    let mut used: HashSet<TaskId> = project.tasks().iter().map(|t| t.id).collect();
    let mut explicit: Vec<Option<TaskId>> = Vec::with_capacity(payload.tasks.len());
    for entry in &payload.tasks {
        let id = entry
            .id
            .as_deref()
            .map(str::parse::<TaskId>)
            .transpose()
            .map_err(StoreError::Model)?;
        if let Some(id) = id {
            if !project.contains(id) && !used.insert(id) {
                return Err(StoreError::Model(Error::InvalidField {
                    field: "id",
                    reason: format!("{id} appears twice in the batch"),
                }));
            }
        }
        explicit.push(id);
    }

    let mut next = project.next_suffix();
    let mut targets: Vec<(TaskId, bool)> = Vec::with_capacity(payload.tasks.len());
    for id in &explicit {
        match id {
            Some(id) => targets.push((*id, project.contains(*id))),
            None => {
                while used.contains(&TaskId::new(next)) {
                    next += 1;
                }
                let id = TaskId::new(next);
                used.insert(id);
                targets.push((id, false));
            }
        }
    }

    // Phase 2: batch name table (first occurrence wins) and dependency
    // resolution.
    let mut by_name: BTreeMap<&str, TaskId> = BTreeMap::new();
    for (entry, (id, _)) in payload.tasks.iter().zip(&targets) {
        by_name.entry(entry.name.as_str()).or_insert(*id);
    }
    let batch_ids: HashSet<TaskId> = targets.iter().map(|(id, _)| *id).collect();

    let resolve_dep = |reference: &str| -> Result<TaskId> {
        if let Ok(id) = reference.parse::<TaskId>() {
            if project.contains(id) || batch_ids.contains(&id) {
                return Ok(id);
            }
        }
        by_name
            .get(reference)
            .copied()
            .ok_or_else(|| StoreError::Model(Error::UnresolvedReference(reference.to_string())))
    };

    let mut ops = Vec::with_capacity(payload.tasks.len());
    for (entry, (id, exists)) in payload.tasks.iter().zip(&targets) {
        let deps: Option<BTreeSet<TaskId>> = match &entry.depends_on {
            Some(refs) => {
                let mut set = BTreeSet::new();
                for reference in refs {
                    set.insert(resolve_dep(reference)?);
                }
                Some(set)
            }
            None => None,
        };

        if *exists {
            ops.push(MergeOp::Update {
                id: *id,
                patch: TaskPatch {
                    name: Some(entry.name.clone()),
                    duration_hours: Some(entry.duration_hrs),
                    deadline: entry.deadline.map(Some),
                    proposed_start: entry.proposed_start.map(Some),
                    background: entry.background,
                    flexible: entry.flexible,
                    project: entry.project.clone(),
                    notes: entry.notes.clone(),
                    replace_deps: deps,
                    ..TaskPatch::default()
                },
            });
        } else {
            ops.push(MergeOp::Create {
                id: Some(*id),
                draft: TaskDraft {
                    name: entry.name.clone(),
                    duration_hours: entry.duration_hrs,
                    depends_on: deps.unwrap_or_default(),
                    deadline: entry.deadline,
                    proposed_start: entry.proposed_start,
                    background: entry.background.unwrap_or(false),
                    flexible: entry.flexible.unwrap_or(false),
                    project: entry.project.clone().unwrap_or_default(),
                    tags: entry.tags.clone().unwrap_or_default().into_iter().collect(),
                    notes: entry.notes.clone().unwrap_or_default(),
                },
            });
        }
    }
    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagr_core::ProjectConfig;
    use pretty_assertions::assert_eq;

    fn base_project() -> Project {
        let mut project = Project::new(ProjectConfig::default());
        project
            .add_task(TaskDraft::new("Existing work", 4.0))
            .unwrap();
        project
    }

    #[test]
    fn names_resolve_within_the_batch() {
        let mut project = base_project();
        let payload = parse_payload(
            r#"{"tasks": [
                {"name": "Gather data", "duration_hrs": 3.0},
                {"name": "Crunch numbers", "duration_hrs": 2.0,
                 "depends_on": ["Gather data", "T-1"]}
            ]}"#,
        )
        .unwrap();

        let ops = resolve_payload(&project, &payload).unwrap();
        let (ids, _) = project.import_merge(ops).unwrap();
        assert_eq!(ids, vec![TaskId::new(2), TaskId::new(3)]);

        let crunch = project.get(TaskId::new(3)).unwrap();
        assert!(crunch.depends_on.contains(&TaskId::new(2)));
        assert!(crunch.depends_on.contains(&TaskId::new(1)));
    }

    #[test]
    fn matching_id_updates_in_place() {
        let mut project = base_project();
        let payload = parse_payload(
            r#"{"tasks": [
                {"id": "T-1", "name": "Existing work, rescoped", "duration_hrs": 6.5}
            ]}"#,
        )
        .unwrap();

        let ops = resolve_payload(&project, &payload).unwrap();
        project.import_merge(ops).unwrap();

        assert_eq!(project.tasks().len(), 1);
        let task = project.get(TaskId::new(1)).unwrap();
        assert_eq!(task.name, "Existing work, rescoped");
        assert_eq!(task.duration_hours, 6.5);
    }

    #[test]
    fn update_leaves_absent_fields_alone() {
        let mut project = Project::new(ProjectConfig::default());
        project
            .add_task(TaskDraft::new("Keep my tags", 4.0).tag("keep").background())
            .unwrap();
        let payload = parse_payload(
            r#"{"tasks": [{"id": "T-1", "name": "Keep my tags", "duration_hrs": 5.0}]}"#,
        )
        .unwrap();

        let ops = resolve_payload(&project, &payload).unwrap();
        project.import_merge(ops).unwrap();

        let task = project.get(TaskId::new(1)).unwrap();
        assert!(task.background, "absent background must not reset");
        assert!(task.has_tag("keep"));
        assert_eq!(task.duration_hours, 5.0);
    }

    #[test]
    fn unknown_reference_fails_the_whole_batch() {
        let mut project = base_project();
        let payload = parse_payload(
            r#"{"tasks": [
                {"name": "Fine", "duration_hrs": 1.0},
                {"name": "Broken", "duration_hrs": 1.0, "depends_on": ["No such thing"]}
            ]}"#,
        )
        .unwrap();

        let err = resolve_payload(&project, &payload).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Model(Error::UnresolvedReference(ref name)) if name == "No such thing"
        ));
        assert_eq!(project.tasks().len(), 1, "nothing was merged");
    }

    #[test]
    fn forced_new_ids_are_honored() {
        let mut project = base_project();
        let payload = parse_payload(
            r#"{"tasks": [
                {"id": "T-14", "name": "Side quest", "duration_hrs": 0.2, "flexible": true},
                {"name": "Filler", "duration_hrs": 1.0}
            ]}"#,
        )
        .unwrap();

        let ops = resolve_payload(&project, &payload).unwrap();
        let (ids, _) = project.import_merge(ops).unwrap();

        assert_eq!(ids, vec![TaskId::new(14), TaskId::new(2)]);
        assert!(project.get(TaskId::new(14)).unwrap().flexible);
    }

    #[test]
    fn batch_entries_may_depend_on_forced_ids() {
        let mut project = base_project();
        let payload = parse_payload(
            r#"{"tasks": [
                {"id": "T-10", "name": "Head", "duration_hrs": 2.0},
                {"name": "Tail", "duration_hrs": 1.0, "depends_on": ["T-10"]}
            ]}"#,
        )
        .unwrap();

        let ops = resolve_payload(&project, &payload).unwrap();
        let (ids, _) = project.import_merge(ops).unwrap();
        assert_eq!(ids[0], TaskId::new(10));
        assert!(project.get(ids[1]).unwrap().depends_on.contains(&TaskId::new(10)));
    }
}
