use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::agent::{ExecutionId, ExecutionResult, ExecutionState};
use crate::store::ExecutionStore;

use super::RunnerError;

/// Submitter-side poll tick: small enough to feel interactive, large enough
/// to spare the filesystem.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Extra window past the execution's own deadline so the runner can flush a
/// terminal status after its child is killed.
pub const COMPLETION_GRACE: Duration = Duration::from_secs(30);

/// Polls the status file until the execution reaches a terminal state, then
/// returns the result or assembles a failure message from `error` and
/// `exitCode`. Never writes; the runner is the only writer.
pub fn wait_for_completion(
    store: &ExecutionStore,
    execution_id: &ExecutionId,
    timeout: Duration,
) -> Result<ExecutionResult, RunnerError> {
    let deadline = Instant::now() + timeout + COMPLETION_GRACE;
    let execution = store.get(execution_id)?;
    let mut last_state: Option<ExecutionState> = None;

    loop {
        if Instant::now() >= deadline {
            return Err(RunnerError::CompletionTimeout);
        }
        thread::sleep(POLL_INTERVAL);

        let status = match execution.get_status() {
            Ok(status) => status,
            Err(error) => {
                warn!(execution_id = %execution_id, %error, "failed to read execution status");
                continue;
            }
        };

        if last_state != Some(status.state) {
            info!(execution_id = %execution_id, state = %status.state, "execution state changed");
            last_state = Some(status.state);
        }

        if !status.state.is_finished() {
            continue;
        }

        if status.state == ExecutionState::Succeeded {
            return Ok(execution.get_result()?);
        }

        let mut parts = Vec::new();
        if let Some(error) = status.error {
            parts.push(error);
        }
        if let Some(exit_code) = status.exit_code {
            parts.push(format!("exit code {exit_code}"));
        }
        let message = if parts.is_empty() {
            "unknown error".to_string()
        } else {
            parts.join("; ")
        };
        return Err(RunnerError::ExecutionFailed { message });
    }
}
