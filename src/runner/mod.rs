mod poll;
mod spawn;

pub use poll::{wait_for_completion, COMPLETION_GRACE, POLL_INTERVAL};
pub use spawn::spawn_runner;

use chrono::Utc;
use std::thread;
use tracing::{info, warn};

use crate::agent::{
    AgentConfigError, ExecutionError, ExecutionId, ExecutionResult, ExecutionState,
    ExecutionStatus, RuntimeError,
};
use crate::runtime::RuntimeRegistry;
use crate::shared::dirs::DirsError;
use crate::store::{ExecutionHandle, ExecutionStore};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    AgentConfig(#[from] AgentConfigError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Dirs(#[from] DirsError),
    #[error("execution state is {state}")]
    NotRunnable { state: ExecutionState },
    #[error("execution state must be created, failed, or succeeded to retry")]
    RetryStateInvalid { state: ExecutionState },
    #[error("execution failed: {message}")]
    ExecutionFailed { message: String },
    #[error("timed out waiting for execution completion")]
    CompletionTimeout,
    #[error("spawn runner process: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },
}

/// Drives one execution end-to-end: state transitions, adapter invocation,
/// terminal result or failure. An execution failure is converted into a
/// `failed` terminal status and reported as success here; only store or
/// bookkeeping failures surface as errors.
pub fn run_execution(
    store: &ExecutionStore,
    registry: &RuntimeRegistry,
    execution_id: &ExecutionId,
    retry: bool,
) -> Result<(), RunnerError> {
    info!(execution_id = %execution_id, "starting execution runner");

    let execution = store.get(execution_id)?;
    let input = execution.get_input()?;
    let mut status = execution.get_status()?;

    if status.state != ExecutionState::Created {
        if !retry {
            return Err(RunnerError::NotRunnable {
                state: status.state,
            });
        }
        if !status.state.is_finished() {
            return Err(RunnerError::RetryStateInvalid {
                state: status.state,
            });
        }
        info!(execution_id = %execution_id, state = %status.state, "retrying finished execution");
    }

    let agent_config = execution.get_agent_config()?;
    let runtime = registry.get(agent_config.runtime.kind)?;
    let timeout = input.timeout.as_duration();

    status.state = ExecutionState::Started;
    status.attempts += 1;
    status.error = None;
    status.exit_code = None;
    status.finished_at = None;
    status = execution.update_status(status)?;

    let mut instance = match runtime.execute(execution_id, &input, &agent_config) {
        Ok(instance) => instance,
        Err(error) => {
            warn!(execution_id = %execution_id, %error, "runtime start failed");
            finish_with_failure(&execution, status, error.to_string(), None)?;
            return Ok(());
        }
    };

    status.state = ExecutionState::Running;
    status = execution.update_status(status)?;

    // The event stream exists for progress hooks; the runner only has to
    // keep it drained.
    if let Some(events) = instance.take_events() {
        thread::spawn(move || while events.recv().is_ok() {});
    }

    match instance.wait(timeout) {
        Ok(result) => {
            execution.set_result(&ExecutionResult {
                response: result.response,
                conversation_id: result.conversation_id,
            })?;
            info!(execution_id = %execution_id, "execution succeeded");
            Ok(())
        }
        Err(error) => {
            warn!(execution_id = %execution_id, %error, "execution failed");
            let exit_code = error.exit_code;
            finish_with_failure(&execution, status, error.message, exit_code)?;
            Ok(())
        }
    }
}

fn finish_with_failure(
    execution: &ExecutionHandle,
    mut status: ExecutionStatus,
    message: String,
    exit_code: Option<i32>,
) -> Result<(), RunnerError> {
    status.state = ExecutionState::Failed;
    status.finished_at = Some(Utc::now());
    status.error = Some(message);
    status.exit_code = exit_code;
    execution.update_status(status)?;
    Ok(())
}
