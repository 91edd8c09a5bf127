use chrono::{DateTime, Utc};
use std::fs::File;
use std::path::Path;

use crate::agent::{ExecutionId, RuntimeError, RuntimeKind};

/// Per-session stdin/stdout/stderr log files under
/// `<logRoot>/<kind>/<executionId>/<timestamp>/`. All three are closed when
/// the scanner thread drops them after reaping the child.
pub(crate) struct SessionLog {
    pub stdin: File,
    pub stdout: File,
    pub stderr: File,
}

impl SessionLog {
    pub fn create(
        log_root: &Path,
        kind: RuntimeKind,
        execution_id: &ExecutionId,
        started_at: DateTime<Utc>,
    ) -> Result<Self, RuntimeError> {
        let dir = log_root
            .join(kind.as_str())
            .join(execution_id.as_str())
            .join(started_at.format("%Y-%m-%d_%H-%M-%S").to_string());
        std::fs::create_dir_all(&dir).map_err(|source| log_error(&dir, source))?;

        Ok(Self {
            stdin: create_log_file(&dir, "stdin.log")?,
            stdout: create_log_file(&dir, "stdout.log")?,
            stderr: create_log_file(&dir, "stderr.log")?,
        })
    }
}

fn create_log_file(dir: &Path, name: &str) -> Result<File, RuntimeError> {
    let path = dir.join(name);
    File::create(&path).map_err(|source| log_error(&path, source))
}

fn log_error(path: &Path, source: std::io::Error) -> RuntimeError {
    RuntimeError::SessionLog {
        path: path.display().to_string(),
        source,
    }
}
