use chrono::Utc;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread;
use tracing::{debug, warn};

use crate::agent::{
    ExecutionId, ExecutionInput, RuntimeError, RuntimeEvent, RuntimeExecutionError,
    RuntimeInstance, RuntimeKind, RuntimeResult,
};
use crate::shared::dirs::resolve_runtime_log_dir;

use super::session_log::SessionLog;

/// Folds one decoded stdout event into the accumulating result. Each kind
/// supplies its own rule (append vs overwrite, see the adapter modules).
pub(crate) type EventFold = fn(&mut RuntimeResult, &serde_json::Value);

const EVENT_CHANNEL_CAPACITY: usize = 2;

/// Spawns the child and wires up the shared supervision skeleton: prompt
/// piped to stdin (tee'd to `stdin.log`), stderr drained into a buffer and
/// `stderr.log`, stdout scanned line-by-line through `stdout.log`.
///
/// The scanner thread owns the child: it reaps it, closes the session logs,
/// emits `runtime-finished`, and publishes exactly one outcome.
pub(crate) fn spawn_instance(
    kind: RuntimeKind,
    program: PathBuf,
    args: Vec<String>,
    execution_id: &ExecutionId,
    input: &ExecutionInput,
    fold: EventFold,
) -> Result<RuntimeInstance, RuntimeError> {
    let log_root = resolve_runtime_log_dir()?;
    let logs = SessionLog::create(&log_root, kind, execution_id, Utc::now())?;

    let mut command = Command::new(&program);
    command
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    match working_directory(input) {
        Some(dir) => {
            command.current_dir(dir);
        }
        None => {
            let cwd = std::env::current_dir()
                .map_err(|source| RuntimeError::Spawn { kind, source })?;
            command.current_dir(cwd);
        }
    }

    let mut child = command
        .spawn()
        .map_err(|source| RuntimeError::Spawn { kind, source })?;
    let child_pid = child.id();

    let (events_tx, events_rx) = mpsc::sync_channel(EVENT_CHANNEL_CAPACITY);
    let (outcome_tx, outcome_rx) = mpsc::sync_channel(1);

    emit_event(
        &events_tx,
        RuntimeEvent::Started {
            timestamp: Utc::now(),
        },
    );

    feed_stdin(&mut child, input.prompt.clone(), logs.stdin);
    let stderr_handle = drain_stderr(&mut child, logs.stderr);
    let stdout = child.stdout.take();

    thread::spawn(move || {
        let mut result = RuntimeResult::default();
        let scan_error = match stdout {
            Some(pipe) => scan_events(kind, pipe, logs.stdout, fold, &mut result),
            None => Some(std::io::Error::other("missing stdout pipe")),
        };

        let wait_result = child.wait();
        let stderr_text = stderr_handle
            .join()
            .unwrap_or_default();

        let outcome = if let Some(source) = scan_error {
            Err(
                RuntimeExecutionError::new(format!("read {kind} output: {source}"))
                    .with_source(source),
            )
        } else {
            match wait_result {
                Ok(status) if status.success() => Ok(result),
                Ok(status) => {
                    let trimmed = stderr_text.trim();
                    let message = if trimmed.is_empty() {
                        format!("{kind} exited with {status}")
                    } else {
                        trimmed.to_string()
                    };
                    Err(RuntimeExecutionError::new(message).with_exit_code(status.code()))
                }
                Err(source) => Err(
                    RuntimeExecutionError::new(format!("wait for {kind}: {source}"))
                        .with_source(source),
                ),
            }
        };

        emit_event(
            &events_tx,
            RuntimeEvent::Finished {
                timestamp: Utc::now(),
            },
        );
        drop(events_tx);

        let _ = outcome_tx.send(outcome);
    });

    Ok(RuntimeInstance {
        child_pid,
        events: Some(events_rx),
        outcome: outcome_rx,
    })
}

fn working_directory(input: &ExecutionInput) -> Option<&str> {
    input
        .working_directory
        .as_deref()
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
}

fn feed_stdin(child: &mut Child, prompt: String, mut stdin_log: File) {
    let Some(mut stdin) = child.stdin.take() else {
        return;
    };
    thread::spawn(move || {
        let _ = stdin_log.write_all(prompt.as_bytes());
        let _ = stdin.write_all(prompt.as_bytes());
        // Dropping the pipe signals end-of-input to the child.
    });
}

fn drain_stderr(child: &mut Child, mut stderr_log: File) -> thread::JoinHandle<String> {
    let stderr = child.stderr.take();
    thread::spawn(move || {
        let Some(mut stderr) = stderr else {
            return String::new();
        };
        let mut collected = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            match stderr.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(read) => {
                    let _ = stderr_log.write_all(&chunk[..read]);
                    collected.extend_from_slice(&chunk[..read]);
                }
            }
        }
        String::from_utf8_lossy(&collected).into_owned()
    })
}

/// Reads stdout line-by-line, tee'ing every raw line into the stdout log.
/// Non-JSON framing is tolerated; only a hard read error is returned.
fn scan_events(
    kind: RuntimeKind,
    pipe: std::process::ChildStdout,
    mut stdout_log: File,
    fold: EventFold,
    result: &mut RuntimeResult,
) -> Option<std::io::Error> {
    let mut reader = BufReader::new(pipe);
    let mut raw_line = Vec::new();

    loop {
        raw_line.clear();
        match reader.read_until(b'\n', &mut raw_line) {
            Ok(0) => return None,
            Ok(_) => {}
            Err(source) => {
                // Unblock the child before reaping it.
                let _ = std::io::copy(&mut reader, &mut std::io::sink());
                return Some(source);
            }
        }

        let _ = stdout_log.write_all(&raw_line);

        let line = String::from_utf8_lossy(&raw_line);
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !trimmed.starts_with('{') {
            debug!(runtime = %kind, line = trimmed, "skipping non-JSON output line");
            continue;
        }

        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(event) => fold(result, &event),
            Err(error) => {
                warn!(runtime = %kind, line = trimmed, %error, "skipping malformed JSON output line");
            }
        }
    }
}

fn emit_event(events: &SyncSender<RuntimeEvent>, event: RuntimeEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            warn!(?event, "runtime event dropped because the channel is full");
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}
