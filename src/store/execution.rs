use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::agent::{
    AgentConfig, ExecutionError, ExecutionId, ExecutionInput, ExecutionResult, ExecutionState,
    ExecutionStatus,
};
use crate::shared::fs_atomic::replace_file;

const INPUT_FILE: &str = "input.json";
const AGENT_CONFIG_FILE: &str = "agent-config.json";
const STATUS_FILE: &str = "status.json";
const RESULT_FILE: &str = "result.json";

/// Filesystem-backed execution repository. One directory per execution,
/// named by its id; every state file is replaced rename-atomically so a
/// concurrent reader never sees a partial record.
#[derive(Debug, Clone)]
pub struct ExecutionStore {
    base: PathBuf,
}

impl ExecutionStore {
    pub fn open(base: impl Into<PathBuf>) -> Result<Self, ExecutionError> {
        let base = base.into();
        fs::create_dir_all(&base).map_err(|source| io_error(&base, source))?;
        Ok(Self { base })
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    /// Validates the input, then persists a fresh execution: `input.json`,
    /// the agent-config snapshot, and a `created` status. Nothing is written
    /// when validation fails.
    pub fn create(
        &self,
        input: &ExecutionInput,
        agent_config: &AgentConfig,
    ) -> Result<ExecutionId, ExecutionError> {
        input.validate()?;

        let id = ExecutionId::generate();
        let dir = self.base.join(id.as_str());
        fs::create_dir_all(&dir).map_err(|source| io_error(&dir, source))?;

        write_json(&dir.join(INPUT_FILE), input)?;
        write_json(&dir.join(AGENT_CONFIG_FILE), agent_config)?;
        write_json(
            &dir.join(STATUS_FILE),
            &ExecutionStatus::new_created(Utc::now()),
        )?;

        Ok(id)
    }

    pub fn exists(&self, id: &ExecutionId) -> Result<bool, ExecutionError> {
        let dir = self.base.join(id.as_str());
        match fs::metadata(&dir) {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(io_error(&dir, source)),
        }
    }

    pub fn get(&self, id: &ExecutionId) -> Result<ExecutionHandle, ExecutionError> {
        if !self.exists(id)? {
            return Err(ExecutionError::NotFound);
        }
        Ok(ExecutionHandle {
            id: id.clone(),
            dir: self.base.join(id.as_str()),
        })
    }

    /// Lists execution ids, ascending. Entries that are not directories or
    /// whose name is not a canonical UUID are skipped.
    pub fn find(&self) -> Result<Vec<ExecutionId>, ExecutionError> {
        let entries = fs::read_dir(&self.base).map_err(|source| io_error(&self.base, source))?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| io_error(&self.base, source))?;
            let file_type = entry
                .file_type()
                .map_err(|source| io_error(&entry.path(), source))?;
            if !file_type.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Ok(id) = ExecutionId::parse(name) {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }
}

/// Accessor for one execution's records, bound to its directory.
#[derive(Debug, Clone)]
pub struct ExecutionHandle {
    id: ExecutionId,
    dir: PathBuf,
}

impl ExecutionHandle {
    pub fn id(&self) -> &ExecutionId {
        &self.id
    }

    pub fn get_input(&self) -> Result<ExecutionInput, ExecutionError> {
        read_json(&self.dir.join(INPUT_FILE), ExecutionError::NotFound)
    }

    pub fn get_agent_config(&self) -> Result<AgentConfig, ExecutionError> {
        read_json(
            &self.dir.join(AGENT_CONFIG_FILE),
            ExecutionError::AgentConfigNotFound,
        )
    }

    pub fn get_status(&self) -> Result<ExecutionStatus, ExecutionError> {
        read_json(&self.dir.join(STATUS_FILE), ExecutionError::NotFound)
    }

    /// Persists the status, refreshing `updatedAt`. Returns the record as
    /// stored.
    pub fn update_status(
        &self,
        mut status: ExecutionStatus,
    ) -> Result<ExecutionStatus, ExecutionError> {
        status.updated_at = Utc::now();
        write_json(&self.dir.join(STATUS_FILE), &status)?;
        Ok(status)
    }

    pub fn has_result(&self) -> Result<bool, ExecutionError> {
        let path = self.dir.join(RESULT_FILE);
        match fs::metadata(&path) {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(io_error(&path, source)),
        }
    }

    pub fn get_result(&self) -> Result<ExecutionResult, ExecutionError> {
        read_json(&self.dir.join(RESULT_FILE), ExecutionError::NoResult)
    }

    /// Stores the result and transitions the execution to `succeeded`.
    /// Writing again overwrites the previous result.
    pub fn set_result(&self, result: &ExecutionResult) -> Result<(), ExecutionError> {
        write_json(&self.dir.join(RESULT_FILE), result)?;

        let mut status = self.get_status()?;
        status.state = ExecutionState::Succeeded;
        status.finished_at = Some(Utc::now());
        self.update_status(status)?;
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ExecutionError {
    ExecutionError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, missing: ExecutionError) -> Result<T, ExecutionError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Err(missing),
        Err(source) => return Err(io_error(path, source)),
    };
    serde_json::from_str(&raw).map_err(|source| ExecutionError::Decode {
        path: path.display().to_string(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ExecutionError> {
    let encoded = serde_json::to_vec_pretty(value).map_err(ExecutionError::Encode)?;
    replace_file(path, &encoded).map_err(|source| io_error(path, source))
}
