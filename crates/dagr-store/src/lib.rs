//! # dagr-store
//!
//! `dagr.json` persistence and the bulk-import payload for DAGr.
//!
//! The state file lives in the working directory that runs the command.
//! Loading validates every invariant the domain enforces; saving goes
//! through a sibling temp file and an atomic rename so a crash mid-write
//! never truncates the previous state. Unknown JSON fields are carried
//! through a load/save cycle untouched.

use dagr_core::{Project, TaskId, Warning};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub mod import;
pub mod records;

pub use import::{parse_payload, resolve_payload, ImportEntry, ImportPayload};
pub use records::{ConfigRecord, StateRecord, TaskRecord};

/// Name of the state file inside the working directory.
pub const STATE_FILE: &str = "dagr.json";

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no project state found; run 'dagr init' first")]
    NotInitialized,

    #[error(transparent)]
    Model(#[from] dagr_core::Error),

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed state file: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A project plus the unknown JSON fields that rode along with it.
#[derive(Clone, Debug)]
pub struct StateFile {
    pub project: Project,
    root_extra: Map<String, Value>,
    config_extra: Map<String, Value>,
    task_extra: HashMap<TaskId, Map<String, Value>>,
}

impl StateFile {
    /// Wrap a freshly built project (no foreign fields yet).
    pub fn new(project: Project) -> Self {
        Self {
            project,
            root_extra: Map::new(),
            config_extra: Map::new(),
            task_extra: HashMap::new(),
        }
    }

    /// Load and validate the state file at `path`.
    ///
    /// A missing file is [`StoreError::NotInitialized`]; every other
    /// failure keeps its cause.
    pub fn load(path: &Path) -> Result<(Self, Vec<Warning>)> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotInitialized);
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let record: StateRecord = serde_json::from_str(&raw)?;

        let (config, config_extra) = record.config.into_config()?;
        let mut tasks = Vec::with_capacity(record.tasks.len());
        let mut task_extra = HashMap::new();
        for task_record in record.tasks {
            let (task, extra) = task_record.into_task()?;
            if !extra.is_empty() {
                task_extra.insert(task.id, extra);
            }
            tasks.push(task);
        }
        let (project, warnings) = Project::from_parts(config, tasks)?;

        debug!(tasks = project.tasks().len(), path = %path.display(), "state loaded");
        Ok((
            Self {
                project,
                root_extra: record.extra,
                config_extra,
                task_extra,
            },
            warnings,
        ))
    }

    /// Serialize and atomically replace the state file at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let record = self.to_record();
        let mut body = serde_json::to_string_pretty(&record)?;
        body.push('\n');

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "state saved");
        Ok(())
    }

    fn to_record(&self) -> StateRecord {
        let mut config = ConfigRecord::from_config(&self.project.config);
        config.extra = self.config_extra.clone();

        let tasks = self
            .project
            .tasks()
            .iter()
            .map(|task| {
                let mut record = TaskRecord::from_task(task);
                if let Some(extra) = self.task_extra.get(&task.id) {
                    record.extra = extra.clone();
                }
                record
            })
            .collect();

        StateRecord {
            config,
            tasks,
            extra: self.root_extra.clone(),
        }
    }
}
