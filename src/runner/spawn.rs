use std::process::{Command, Stdio};

use crate::agent::ExecutionId;
use crate::shared::dirs::{resolve_sibling_executable, EXECUTABLE_RUNNER};

use super::RunnerError;

/// Spawns the runner binary as an independent process: own process group,
/// no inherited stdio, handle released immediately. The runner outlives the
/// submitter and coordinates with it only through the store.
pub fn spawn_runner(execution_id: &ExecutionId) -> Result<(), RunnerError> {
    let program = resolve_sibling_executable(EXECUTABLE_RUNNER)?;

    let mut command = Command::new(program);
    command
        .arg(execution_id.as_str())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let child = command
        .spawn()
        .map_err(|source| RunnerError::Spawn { source })?;
    drop(child);

    Ok(())
}
