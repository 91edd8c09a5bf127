use std::path::{Path, PathBuf};

use crate::shared::process::lookup_executable;

pub const EXECUTABLE_CTL: &str = "briefkit-ctl";
pub const EXECUTABLE_MCP: &str = "briefkit-mcp";
pub const EXECUTABLE_RUNNER: &str = "briefkit-runner";

pub const ENV_RUNTIME_LOG_DIR: &str = "BRIEFKIT_RUNTIME_LOG_DIR";
pub const ENV_STORE_ROOT: &str = "BRIEFKIT_STORE_ROOT";

const DEFAULT_RUNTIME_LOG_DIR: &str = "~/.orbiqd/briefkit/logs/runtime";
const DEFAULT_STORE_ROOT: &str = "~/.orbiqd/briefkit";

#[derive(Debug, thiserror::Error)]
pub enum DirsError {
    #[error("failed to resolve home directory")]
    HomeDirectoryUnavailable,
    #[error("executable not found: {name}")]
    ExecutableNotFound { name: String },
    #[error("executable from {env_var} not found: {source}")]
    EnvExecutableMissing {
        env_var: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to resolve path {path}: {source}")]
    Resolve {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Expands a leading `~` to the value of `$HOME`.
pub fn expand_home(path: &str) -> Result<PathBuf, DirsError> {
    if path == "~" {
        return home_dir();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return Ok(home_dir()?.join(rest));
    }
    Ok(PathBuf::from(path))
}

fn home_dir() -> Result<PathBuf, DirsError> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or(DirsError::HomeDirectoryUnavailable)
}

fn absolutize(path: &Path) -> Result<PathBuf, DirsError> {
    std::path::absolute(path).map_err(|source| DirsError::Resolve {
        path: path.display().to_string(),
        source,
    })
}

/// Root directory for per-session stdin/stdout/stderr logs.
pub fn resolve_runtime_log_dir() -> Result<PathBuf, DirsError> {
    let raw = std::env::var(ENV_RUNTIME_LOG_DIR)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_RUNTIME_LOG_DIR.to_string());
    absolutize(&expand_home(&raw)?)
}

/// Root directory for the execution store and agent config files.
pub fn resolve_store_root() -> Result<PathBuf, DirsError> {
    let raw = std::env::var(ENV_STORE_ROOT)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_STORE_ROOT.to_string());
    absolutize(&expand_home(&raw)?)
}

/// Locates a sibling briefkit executable: the `BRIEFKIT_<NAME>_PATH`
/// environment override wins, then a file next to the current executable,
/// then a PATH lookup.
pub fn resolve_sibling_executable(name: &str) -> Result<PathBuf, DirsError> {
    let env_var = format!("BRIEFKIT_{}_PATH", screaming_snake(name));
    if let Some(env_path) = std::env::var_os(&env_var) {
        let env_path = PathBuf::from(env_path);
        return match std::fs::metadata(&env_path) {
            Ok(_) => Ok(env_path),
            Err(source) => Err(DirsError::EnvExecutableMissing { env_var, source }),
        };
    }

    if let Ok(current) = std::env::current_exe() {
        let resolved = std::fs::canonicalize(&current).unwrap_or(current);
        if let Some(dir) = resolved.parent() {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    lookup_executable(&[name]).map_err(|_| DirsError::ExecutableNotFound {
        name: name.to_string(),
    })
}

fn screaming_snake(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            '-' | ' ' | '.' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screaming_snake_handles_hyphenated_names() {
        assert_eq!(screaming_snake("briefkit-runner"), "BRIEFKIT_RUNNER");
        assert_eq!(screaming_snake("briefkit-mcp"), "BRIEFKIT_MCP");
    }

    #[test]
    fn expand_home_leaves_plain_paths_alone() {
        assert_eq!(expand_home("/tmp/x").expect("expand"), PathBuf::from("/tmp/x"));
        assert_eq!(
            expand_home("relative/path").expect("expand"),
            PathBuf::from("relative/path")
        );
    }
}
