use std::fs;
use std::path::{Path, PathBuf};

use crate::agent::{AgentConfig, AgentConfigError, AgentId};
use crate::shared::fs_atomic::replace_file;

const CONFIG_EXTENSION: &str = "yaml";

/// Directory of operator-written `<agent-id>.yaml` files. The agent id is
/// derived from the file name; files that do not parse as an id are ignored
/// when listing.
#[derive(Debug, Clone)]
pub struct AgentConfigStore {
    base: PathBuf,
}

impl AgentConfigStore {
    pub fn open(base: impl Into<PathBuf>) -> Result<Self, AgentConfigError> {
        let base = base.into();
        fs::create_dir_all(&base).map_err(|source| io_error(&base, source))?;
        Ok(Self { base })
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    fn config_path(&self, id: &AgentId) -> PathBuf {
        self.base.join(format!("{}.{}", id.as_str(), CONFIG_EXTENSION))
    }

    pub fn exists(&self, id: &AgentId) -> Result<bool, AgentConfigError> {
        let path = self.config_path(id);
        match fs::metadata(&path) {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(io_error(&path, source)),
        }
    }

    pub fn get(&self, id: &AgentId) -> Result<AgentConfig, AgentConfigError> {
        let path = self.config_path(id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(AgentConfigError::NotFound)
            }
            Err(source) => return Err(io_error(&path, source)),
        };
        serde_yaml::from_str(&raw).map_err(|source| AgentConfigError::Decode {
            path: path.display().to_string(),
            source,
        })
    }

    /// Replaces the agent's config file atomically.
    pub fn update(&self, id: &AgentId, config: &AgentConfig) -> Result<(), AgentConfigError> {
        let encoded = serde_yaml::to_string(config).map_err(AgentConfigError::Encode)?;
        let path = self.config_path(id);
        replace_file(&path, encoded.as_bytes()).map_err(|source| io_error(&path, source))
    }

    /// Lists agent ids in ascending lexicographic order. Non-YAML files and
    /// files whose stem fails id validation are skipped silently.
    pub fn list(&self) -> Result<Vec<AgentId>, AgentConfigError> {
        let entries = fs::read_dir(&self.base).map_err(|source| io_error(&self.base, source))?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| io_error(&self.base, source))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(CONFIG_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Ok(id) = AgentId::parse(stem) {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> AgentConfigError {
    AgentConfigError::Io {
        path: path.display().to_string(),
        source,
    }
}
