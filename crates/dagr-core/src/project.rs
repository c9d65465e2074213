//! The in-memory project aggregate.
//!
//! [`Project`] owns the configuration and the task arena. Every mutating
//! operation is staged: it runs against a scratch copy, the full invariant
//! set is validated, and only then is the result committed. A failed
//! mutation leaves the project exactly as it was.

use crate::{
    Error, ProjectConfig, Result, StatusKind, Task, TaskId, TaskStatus, Warning,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

// ============================================================================
// Drafts & Patches
// ============================================================================

/// Input for creating a task; the project assigns the id.
#[derive(Clone, Debug, Default)]
pub struct TaskDraft {
    pub name: String,
    pub duration_hours: f64,
    pub depends_on: BTreeSet<TaskId>,
    pub deadline: Option<NaiveDate>,
    pub proposed_start: Option<NaiveDate>,
    pub background: bool,
    pub flexible: bool,
    pub project: String,
    pub tags: BTreeSet<String>,
    pub notes: String,
}

impl TaskDraft {
    pub fn new(name: impl Into<String>, duration_hours: f64) -> Self {
        Self {
            name: name.into(),
            duration_hours,
            ..Self::default()
        }
    }

    pub fn depends_on(mut self, id: TaskId) -> Self {
        self.depends_on.insert(id);
        self
    }

    pub fn deadline(mut self, date: NaiveDate) -> Self {
        self.deadline = Some(date);
        self
    }

    pub fn proposed_start(mut self, date: NaiveDate) -> Self {
        self.proposed_start = Some(date);
        self
    }

    pub fn background(mut self) -> Self {
        self.background = true;
        self
    }

    pub fn flexible(mut self) -> Self {
        self.flexible = true;
        self
    }

    pub fn project(mut self, label: impl Into<String>) -> Self {
        self.project = label.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_duration(self.duration_hours)
    }
}

/// Partial update for an existing task. `None` fields are left untouched;
/// the double-`Option` fields distinguish "leave alone" from "clear".
#[derive(Clone, Debug, Default)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub duration_hours: Option<f64>,
    pub deadline: Option<Option<NaiveDate>>,
    pub proposed_start: Option<Option<NaiveDate>>,
    pub background: Option<bool>,
    pub flexible: Option<bool>,
    pub project: Option<String>,
    pub notes: Option<String>,
    /// Replace the dependency set wholesale (import semantics).
    pub replace_deps: Option<BTreeSet<TaskId>>,
    pub add_deps: Vec<TaskId>,
    pub rm_deps: Vec<TaskId>,
    pub add_tags: Vec<String>,
    pub rm_tags: Vec<String>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.duration_hours.is_none()
            && self.deadline.is_none()
            && self.proposed_start.is_none()
            && self.background.is_none()
            && self.flexible.is_none()
            && self.project.is_none()
            && self.notes.is_none()
            && self.replace_deps.is_none()
            && self.add_deps.is_empty()
            && self.rm_deps.is_empty()
            && self.add_tags.is_empty()
            && self.rm_tags.is_empty()
    }
}

/// One resolved entry of a bulk-import batch.
#[derive(Clone, Debug)]
pub enum MergeOp {
    /// Create a task, optionally with a pre-assigned id (batch entries
    /// reference each other by id before the batch is committed).
    Create {
        id: Option<TaskId>,
        draft: TaskDraft,
    },
    /// Update an existing task in place.
    Update { id: TaskId, patch: TaskPatch },
}

// ============================================================================
// Project
// ============================================================================

/// Configuration plus task arena. Tasks are kept sorted by id suffix; the
/// symbol table maps ids to arena indices and is rebuilt on every commit.
#[derive(Clone, Debug)]
pub struct Project {
    pub config: ProjectConfig,
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
}

impl Project {
    pub fn new(config: ProjectConfig) -> Self {
        Self {
            config,
            tasks: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Rebuild a project from deserialized parts, enforcing the full
    /// invariant set (unique ids, acyclic dependencies, valid fields).
    pub fn from_parts(config: ProjectConfig, tasks: Vec<Task>) -> Result<(Self, Vec<Warning>)> {
        let mut project = Self {
            config,
            tasks,
            index: HashMap::new(),
        };
        project.normalize();
        if project.index.len() != project.tasks.len() {
            let mut seen = HashMap::new();
            for task in &project.tasks {
                if seen.insert(task.id, ()).is_some() {
                    return Err(Error::InvalidField {
                        field: "id",
                        reason: format!("{} appears more than once", task.id),
                    });
                }
            }
        }
        let warnings = project.validate()?;
        Ok((project, warnings))
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.index.get(&id).map(|&i| &self.tasks[i])
    }

    /// Arena index for an id; the solver's graph works on indices.
    pub fn index_of(&self, id: TaskId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The suffix the next created task will receive.
    pub fn next_suffix(&self) -> u32 {
        self.tasks.iter().map(|t| t.id.suffix()).max().unwrap_or(0) + 1
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create a task from a draft, assigning the next free id.
    pub fn add_task(&mut self, draft: TaskDraft) -> Result<(TaskId, Vec<Warning>)> {
        draft.validate()?;
        let id = TaskId::new(self.next_suffix());
        let warnings = self.stage(|p| {
            p.push_task(materialize(id, draft));
            Ok(())
        })?;
        debug!(%id, "task added");
        Ok((id, warnings))
    }

    /// Apply a patch to an existing task.
    pub fn update_task(&mut self, id: TaskId, patch: TaskPatch) -> Result<Vec<Warning>> {
        if !self.contains(id) {
            return Err(Error::UnknownTask(id));
        }
        let warnings = self.stage(|p| {
            let idx = p.index_of(id).ok_or(Error::UnknownTask(id))?;
            apply_patch(&mut p.tasks[idx], &patch)
        })?;
        debug!(%id, "task updated");
        Ok(warnings)
    }

    /// Delete a task and scrub its id from every dependency set.
    pub fn delete_task(&mut self, id: TaskId) -> Result<()> {
        if !self.contains(id) {
            return Err(Error::UnknownTask(id));
        }
        self.stage(|p| {
            p.tasks.retain(|t| t.id != id);
            for task in &mut p.tasks {
                task.depends_on.remove(&id);
            }
            Ok(())
        })?;
        debug!(%id, "task deleted");
        Ok(())
    }

    /// Transition a task to in-progress, recording the actual start.
    pub fn start_task(&mut self, id: TaskId, at: NaiveDateTime) -> Result<Vec<Warning>> {
        let task = self.get(id).ok_or(Error::UnknownTask(id))?;
        match task.status {
            TaskStatus::NotStarted => {}
            ref status @ (TaskStatus::InProgress { .. } | TaskStatus::Done { .. }) => {
                return Err(Error::StatusTransition {
                    from: status.label(),
                    to: "in_progress",
                    reason: "task is already underway; reset it first".into(),
                });
            }
        }
        self.stage(|p| {
            let idx = p.index_of(id).unwrap();
            p.tasks[idx].status = TaskStatus::InProgress { started_at: at };
            Ok(())
        })?;
        Ok(Vec::new())
    }

    /// Transition a task to done, recording the actual finish.
    ///
    /// Open dependencies and a missing prior start are warnings, not
    /// errors; only re-finishing a done task fails.
    pub fn finish_task(&mut self, id: TaskId, at: NaiveDateTime) -> Result<Vec<Warning>> {
        let task = self.get(id).ok_or(Error::UnknownTask(id))?;
        if task.status.is_done() {
            return Err(Error::StatusTransition {
                from: "done",
                to: "done",
                reason: "task is already done".into(),
            });
        }
        let mut warnings = Vec::new();
        let open: Vec<TaskId> = task
            .depends_on
            .iter()
            .filter(|d| self.get(**d).is_some_and(|t| !t.status.is_done()))
            .copied()
            .collect();
        if !open.is_empty() {
            warnings.push(Warning::DoneWithOpenDeps { task: id, open });
        }
        let started_at = task.actual_start();
        if started_at.is_none() {
            warnings.push(Warning::DoneWithoutStart { task: id });
        }
        self.stage(|p| {
            let idx = p.index_of(id).unwrap();
            p.tasks[idx].status = TaskStatus::Done {
                started_at,
                finished_at: at,
            };
            Ok(())
        })?;
        Ok(warnings)
    }

    /// Clear a task back to not-started, dropping both actuals.
    pub fn reset_task(&mut self, id: TaskId) -> Result<()> {
        if !self.contains(id) {
            return Err(Error::UnknownTask(id));
        }
        self.stage(|p| {
            let idx = p.index_of(id).unwrap();
            p.tasks[idx].status = TaskStatus::NotStarted;
            Ok(())
        })?;
        Ok(())
    }

    /// Generic status change, routing to the specific transitions.
    pub fn set_status(
        &mut self,
        id: TaskId,
        target: StatusKind,
        at: NaiveDateTime,
    ) -> Result<Vec<Warning>> {
        match target {
            StatusKind::NotStarted => self.reset_task(id).map(|()| Vec::new()),
            StatusKind::InProgress => {
                // Re-opening a done task keeps its original start if known.
                let task = self.get(id).ok_or(Error::UnknownTask(id))?;
                if let TaskStatus::Done { started_at, .. } = task.status {
                    let started_at = started_at.unwrap_or(at);
                    self.stage(|p| {
                        let idx = p.index_of(id).unwrap();
                        p.tasks[idx].status = TaskStatus::InProgress { started_at };
                        Ok(())
                    })?;
                    Ok(Vec::new())
                } else {
                    self.start_task(id, at)
                }
            }
            StatusKind::Done => self.finish_task(id, at),
        }
    }

    /// Set (or with `None`, clear) a capacity override for a date.
    pub fn set_capacity_override(&mut self, date: NaiveDate, hours: Option<f64>) -> Result<()> {
        if let Some(h) = hours {
            if !(h >= 0.0) || !h.is_finite() {
                return Err(Error::InvalidField {
                    field: "capacity",
                    reason: format!("must be >= 0, got {h}"),
                });
            }
        }
        self.stage(|p| {
            match hours {
                Some(h) => p.config.capacity_overrides.insert(date, h),
                None => p.config.capacity_overrides.remove(&date),
            };
            Ok(())
        })?;
        Ok(())
    }

    /// Apply a resolved import batch atomically.
    ///
    /// Returns the ids touched, creations before updates, each group in
    /// batch order.
    pub fn import_merge(&mut self, ops: Vec<MergeOp>) -> Result<(Vec<TaskId>, Vec<Warning>)> {
        let mut created = Vec::new();
        let mut updated = Vec::new();
        for op in &ops {
            if let MergeOp::Create { draft, .. } = op {
                draft.validate()?;
            }
        }
        let warnings = self.stage(|p| {
            for op in ops {
                match op {
                    MergeOp::Create { id, draft } => {
                        let id = id.unwrap_or_else(|| TaskId::new(p.next_suffix()));
                        if p.contains(id) {
                            return Err(Error::InvalidField {
                                field: "id",
                                reason: format!("{id} already exists"),
                            });
                        }
                        p.push_task(materialize(id, draft));
                        created.push(id);
                    }
                    MergeOp::Update { id, patch } => {
                        let idx = p.index_of(id).ok_or(Error::UnknownTask(id))?;
                        apply_patch(&mut p.tasks[idx], &patch)?;
                        updated.push(id);
                    }
                }
            }
            Ok(())
        })?;
        debug!(created = created.len(), updated = updated.len(), "import merged");
        created.extend(updated);
        Ok((created, warnings))
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Check every structural invariant; returns non-fatal findings.
    pub fn validate(&self) -> Result<Vec<Warning>> {
        self.config.validate()?;
        for task in &self.tasks {
            validate_name(&task.name)?;
            validate_duration(task.duration_hours)?;
            for dep in &task.depends_on {
                if !self.contains(*dep) {
                    return Err(Error::UnknownTask(*dep));
                }
                if *dep == task.id {
                    return Err(Error::CycleDetected(vec![task.id, task.id]));
                }
            }
        }
        if let Some(path) = self.find_cycle() {
            return Err(Error::CycleDetected(path));
        }

        let mut warnings = Vec::new();
        for task in &self.tasks {
            if !task.flexible {
                continue;
            }
            let dependents: Vec<TaskId> = self
                .tasks
                .iter()
                .filter(|t| !t.flexible && t.depends_on.contains(&task.id))
                .map(|t| t.id)
                .collect();
            if !dependents.is_empty() {
                warnings.push(Warning::FlexibleBlocksOthers {
                    flexible: task.id,
                    dependents,
                });
            }
        }
        Ok(warnings)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Run a mutation against a scratch copy, validate, then commit.
    fn stage<F>(&mut self, mutate: F) -> Result<Vec<Warning>>
    where
        F: FnOnce(&mut Project) -> Result<()>,
    {
        let mut staged = self.clone();
        mutate(&mut staged)?;
        staged.normalize();
        let warnings = staged.validate()?;
        *self = staged;
        Ok(warnings)
    }

    fn push_task(&mut self, task: Task) {
        self.index.insert(task.id, self.tasks.len());
        self.tasks.push(task);
    }

    /// Restore the sorted-by-suffix arena invariant and rebuild the index.
    fn normalize(&mut self) {
        self.tasks.sort_by_key(|t| t.id.suffix());
        self.index = self
            .tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id, i))
            .collect();
    }

    /// Depth-first search for a dependency cycle. The returned path
    /// starts and ends at the same task, in depends-on direction.
    fn find_cycle(&self) -> Option<Vec<TaskId>> {
        let mut color = vec![Color::White; self.tasks.len()];
        let mut path = Vec::new();
        for root in 0..self.tasks.len() {
            if color[root] == Color::White {
                if let Some(cycle) = self.cycle_from(root, &mut color, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn cycle_from(
        &self,
        node: usize,
        color: &mut [Color],
        path: &mut Vec<usize>,
    ) -> Option<Vec<TaskId>> {
        color[node] = Color::Grey;
        path.push(node);
        for next in self.dep_indices(node) {
            match color[next] {
                Color::White => {
                    if let Some(cycle) = self.cycle_from(next, color, path) {
                        return Some(cycle);
                    }
                }
                Color::Grey => {
                    // Back-edge: the grey chain from `next` onwards is
                    // the cycle.
                    let from = path.iter().position(|&i| i == next).unwrap_or(0);
                    let mut cycle: Vec<TaskId> =
                        path[from..].iter().map(|&i| self.tasks[i].id).collect();
                    cycle.push(self.tasks[next].id);
                    return Some(cycle);
                }
                Color::Black => {}
            }
        }
        path.pop();
        color[node] = Color::Black;
        None
    }

    fn dep_indices(&self, idx: usize) -> Vec<usize> {
        self.tasks[idx]
            .depends_on
            .iter()
            .filter_map(|d| self.index_of(*d))
            .collect()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Grey,
    Black,
}

fn materialize(id: TaskId, draft: TaskDraft) -> Task {
    Task {
        id,
        name: draft.name,
        duration_hours: draft.duration_hours,
        depends_on: draft.depends_on,
        deadline: draft.deadline,
        proposed_start: draft.proposed_start,
        background: draft.background,
        flexible: draft.flexible,
        project: draft.project,
        tags: draft.tags,
        notes: draft.notes,
        status: TaskStatus::NotStarted,
    }
}

fn apply_patch(task: &mut Task, patch: &TaskPatch) -> Result<()> {
    if let Some(name) = &patch.name {
        validate_name(name)?;
        task.name = name.clone();
    }
    if let Some(hours) = patch.duration_hours {
        validate_duration(hours)?;
        task.duration_hours = hours;
    }
    if let Some(deadline) = patch.deadline {
        task.deadline = deadline;
    }
    if let Some(proposed) = patch.proposed_start {
        task.proposed_start = proposed;
    }
    if let Some(background) = patch.background {
        task.background = background;
    }
    if let Some(flexible) = patch.flexible {
        task.flexible = flexible;
    }
    if let Some(project) = &patch.project {
        task.project = project.clone();
    }
    if let Some(notes) = &patch.notes {
        task.notes = notes.clone();
    }
    if let Some(deps) = &patch.replace_deps {
        task.depends_on = deps.clone();
    }
    for dep in &patch.add_deps {
        task.depends_on.insert(*dep);
    }
    for dep in &patch.rm_deps {
        task.depends_on.remove(dep);
    }
    for tag in &patch.add_tags {
        task.tags.insert(tag.clone());
    }
    for tag in &patch.rm_tags {
        task.tags.remove(tag);
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidField {
            field: "name",
            reason: "must not be empty".into(),
        });
    }
    Ok(())
}

fn validate_duration(hours: f64) -> Result<()> {
    if !(hours >= 0.0) || !hours.is_finite() {
        return Err(Error::InvalidField {
            field: "duration_hours",
            reason: format!("must be >= 0, got {hours}"),
        });
    }
    Ok(())
}
