use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::agent::config::{AgentConfig, RuntimeFeatures};
use crate::agent::execution::{ConversationId, ExecutionId, ExecutionInput};
use crate::shared::dirs::DirsError;
use crate::shared::duration::HumanDuration;
use crate::shared::process::{terminate_process, ExecutableLookupError};

/// Supported child-program families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Claude,
    Codex,
    Gemini,
}

impl RuntimeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeKind::Claude => "claude",
            RuntimeKind::Codex => "codex",
            RuntimeKind::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuntimeKind {
    type Err = RuntimeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "claude" => Ok(RuntimeKind::Claude),
            "codex" => Ok(RuntimeKind::Codex),
            "gemini" => Ok(RuntimeKind::Gemini),
            _ => Err(RuntimeError::KindNotFound),
        }
    }
}

/// Lifecycle signal emitted by a runtime instance. Exactly one `Started`
/// precedes exactly one `Finished`; the channel closes after `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RuntimeEvent {
    #[serde(rename = "runtime-started")]
    Started { timestamp: DateTime<Utc> },
    #[serde(rename = "runtime-finished")]
    Finished { timestamp: DateTime<Utc> },
}

impl RuntimeEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            RuntimeEvent::Started { timestamp } | RuntimeEvent::Finished { timestamp } => {
                *timestamp
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeInfo {
    pub version: String,
}

/// Output of a runtime instance once the child has been reaped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeResult {
    pub response: String,
    pub conversation_id: ConversationId,
}

/// Failure of a runtime execution: spawn failure, stream read failure, or a
/// non-zero child exit. `exit_code` is set only when the child actually
/// exited with a code.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct RuntimeExecutionError {
    pub message: String,
    pub exit_code: Option<i32>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RuntimeExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            exit_code: None,
            source: None,
        }
    }

    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn deadline(timeout: Duration) -> Self {
        Self::new(format!(
            "execution deadline of {} exceeded",
            HumanDuration::new(timeout)
        ))
    }
}

/// A live supervised child process plus its streaming parser. The scanner
/// thread owns the child and publishes exactly one outcome.
#[derive(Debug)]
pub struct RuntimeInstance {
    pub(crate) child_pid: u32,
    pub(crate) events: Option<Receiver<RuntimeEvent>>,
    pub(crate) outcome: Receiver<Result<RuntimeResult, RuntimeExecutionError>>,
}

impl RuntimeInstance {
    pub fn pid(&self) -> u32 {
        self.child_pid
    }

    /// The lazy, finite event stream. Can be taken once; the channel closes
    /// when the child is finished.
    pub fn take_events(&mut self) -> Option<Receiver<RuntimeEvent>> {
        self.events.take()
    }

    /// Blocks until the child is reaped and the output stream is fully
    /// consumed. On deadline expiry the child is signalled (TERM, then KILL)
    /// and a deadline error is returned.
    pub fn wait(self, timeout: Duration) -> Result<RuntimeResult, RuntimeExecutionError> {
        match self.outcome.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                terminate_process(self.child_pid, Duration::from_secs(2));
                // Let the scanner reap the child and close the session logs.
                let _ = self.outcome.recv_timeout(Duration::from_secs(2));
                Err(RuntimeExecutionError::deadline(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(RuntimeExecutionError::new(
                "runtime instance terminated without reporting an outcome",
            )),
        }
    }
}

/// Record inside a child agent's own config file describing how to launch an
/// auxiliary tool process. Only stdio transports are supported uniformly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpServer {
    Stdio {
        command: String,
        args: Vec<String>,
    },
}

/// Contract every assistant-kind adapter satisfies.
pub trait Runtime: Send + Sync {
    fn kind(&self) -> RuntimeKind;

    /// Spawns a child for the given input and returns the live instance.
    fn execute(
        &self,
        execution_id: &ExecutionId,
        input: &ExecutionInput,
        agent_config: &AgentConfig,
    ) -> Result<RuntimeInstance, RuntimeError>;

    /// Whether the child binary is locatable on this host. A miss is not an
    /// error.
    fn discovery(&self) -> Result<bool, RuntimeError>;

    /// Probes `--version` and extracts the `N.N.N` token.
    fn get_info(&self) -> Result<RuntimeInfo, RuntimeError>;

    fn default_config(&self) -> serde_json::Value;

    fn default_features(&self) -> RuntimeFeatures;

    fn add_mcp_server(&self, name: &str, server: &McpServer) -> Result<(), RuntimeError>;

    fn list_mcp_servers(&self) -> Result<BTreeMap<String, McpServer>, RuntimeError>;

    fn remove_mcp_server(&self, name: &str) -> Result<(), RuntimeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("runtime not found")]
    KindNotFound,
    #[error("mcp server not found: {name}")]
    McpServerNotFound { name: String },
    #[error("{kind} executable not found: {source}")]
    ExecutableNotFound {
        kind: RuntimeKind,
        #[source]
        source: ExecutableLookupError,
    },
    #[error("executable from {env_var} not found: {source}")]
    EnvExecutableMissing {
        env_var: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported value for --{name}: {reason}")]
    UnsupportedArgument { name: String, reason: String },
    #[error("invalid {kind} runtime config: {source}")]
    ConfigDecode {
        kind: RuntimeKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("read {kind} version: {source}")]
    VersionProbe {
        kind: RuntimeKind,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {kind} version from output: {output}")]
    VersionParse { kind: RuntimeKind, output: String },
    #[error("create session log {path}: {source}")]
    SessionLog {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("start {kind} runtime: {source}")]
    Spawn {
        kind: RuntimeKind,
        #[source]
        source: std::io::Error,
    },
    #[error("runtime config file io at {path}: {source}")]
    McpConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid runtime config file {path}: {message}")]
    McpConfigInvalid { path: String, message: String },
    #[error(transparent)]
    Dirs(#[from] DirsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_known_names_case_insensitively() {
        assert_eq!("claude".parse::<RuntimeKind>().unwrap(), RuntimeKind::Claude);
        assert_eq!(" Codex ".parse::<RuntimeKind>().unwrap(), RuntimeKind::Codex);
        assert_eq!("gemini".parse::<RuntimeKind>().unwrap(), RuntimeKind::Gemini);
        assert!(matches!(
            "cursor".parse::<RuntimeKind>(),
            Err(RuntimeError::KindNotFound)
        ));
    }

    #[test]
    fn event_serializes_with_kind_tag() {
        let event = RuntimeEvent::Started {
            timestamp: Utc::now(),
        };
        let encoded = serde_json::to_value(&event).expect("encode");
        assert_eq!(encoded["kind"], "runtime-started");
    }

    #[test]
    fn deadline_error_names_the_deadline() {
        let err = RuntimeExecutionError::deadline(Duration::from_millis(50));
        assert!(err.message.contains("deadline"));
        assert!(err.message.contains("50ms"));
        assert!(err.exit_code.is_none());
    }
}
