mod agent_config;
mod execution;

pub use agent_config::AgentConfigStore;
pub use execution::{ExecutionHandle, ExecutionStore};

use std::path::{Path, PathBuf};

use crate::agent::{AgentConfigError, ExecutionError};
use crate::shared::dirs::{resolve_store_root, DirsError};

const AGENTS_DIR: &str = "agents";
const EXECUTIONS_DIR: &str = "state/executions";

/// Layout of the store root shared by submitter and runner.
#[derive(Debug, Clone)]
pub struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves the default root, honoring the environment override.
    pub fn resolve_default() -> Result<Self, DirsError> {
        Ok(Self::new(resolve_store_root()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join(AGENTS_DIR)
    }

    pub fn executions_dir(&self) -> PathBuf {
        self.root.join(EXECUTIONS_DIR)
    }

    pub fn open_execution_store(&self) -> Result<ExecutionStore, ExecutionError> {
        ExecutionStore::open(self.executions_dir())
    }

    pub fn open_agent_config_store(&self) -> Result<AgentConfigStore, AgentConfigError> {
        AgentConfigStore::open(self.agents_dir())
    }
}
