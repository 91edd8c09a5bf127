mod arguments;
mod config_file;

pub use arguments::ClaudeRuntimeConfig;
pub use config_file::ENV_CONFIG_PATH;

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::agent::{
    AgentConfig, ExecutionId, ExecutionInput, McpServer, Runtime, RuntimeError, RuntimeFeatures,
    RuntimeInfo, RuntimeInstance, RuntimeKind, RuntimeResult,
};
use crate::shared::process::lookup_executable;

use arguments::ClaudeArguments;

use super::instance::spawn_instance;
use super::probe_version;

pub const ENV_EXECUTABLE: &str = "CLAUDE_EXECUTABLE";

const EXECUTABLE_CANDIDATES: &[&str] = &["claude", "claude-code"];

/// Adapter for the claude CLI: `--print --verbose
/// --output-format=stream-json` with the prompt piped on stdin.
pub struct ClaudeRuntime;

impl ClaudeRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClaudeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn locate_executable() -> Result<PathBuf, RuntimeError> {
    if let Ok(env_path) = std::env::var(ENV_EXECUTABLE) {
        if !env_path.is_empty() {
            let path = PathBuf::from(&env_path);
            return match std::fs::metadata(&path) {
                Ok(_) => Ok(path),
                Err(source) => Err(RuntimeError::EnvExecutableMissing {
                    env_var: ENV_EXECUTABLE.to_string(),
                    source,
                }),
            };
        }
    }

    lookup_executable(EXECUTABLE_CANDIDATES).map_err(|source| RuntimeError::ExecutableNotFound {
        kind: RuntimeKind::Claude,
        source,
    })
}

fn decode_runtime_config(config: &serde_json::Value) -> Result<ClaudeRuntimeConfig, RuntimeError> {
    if config.is_null() {
        return Ok(ClaudeRuntimeConfig::default());
    }
    serde_json::from_value(config.clone()).map_err(|source| RuntimeError::ConfigDecode {
        kind: RuntimeKind::Claude,
        source,
    })
}

/// claude streams assistant text incrementally; the terminal
/// `result`/`success` event carries the authoritative final text and
/// overwrites whatever was accumulated.
fn fold_event(result: &mut RuntimeResult, event: &serde_json::Value) {
    match event.get("type").and_then(serde_json::Value::as_str) {
        Some("system") => {
            if event.get("subtype").and_then(serde_json::Value::as_str) == Some("init") {
                if let Some(session_id) =
                    event.get("session_id").and_then(serde_json::Value::as_str)
                {
                    if !session_id.is_empty() {
                        result.conversation_id = crate::agent::ConversationId::new(session_id);
                    }
                }
            }
        }
        Some("assistant") => {
            let content = event
                .pointer("/message/content")
                .and_then(serde_json::Value::as_array);
            for element in content.into_iter().flatten() {
                if element.get("type").and_then(serde_json::Value::as_str) == Some("text") {
                    if let Some(text) = element.get("text").and_then(serde_json::Value::as_str) {
                        result.response.push_str(text);
                    }
                }
            }
        }
        Some("result") => {
            if event.get("subtype").and_then(serde_json::Value::as_str) == Some("success") {
                if let Some(text) = event.get("result").and_then(serde_json::Value::as_str) {
                    if !text.is_empty() {
                        result.response = text.to_string();
                    }
                }
            }
        }
        _ => {}
    }
}

impl Runtime for ClaudeRuntime {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Claude
    }

    fn execute(
        &self,
        execution_id: &ExecutionId,
        input: &ExecutionInput,
        agent_config: &AgentConfig,
    ) -> Result<RuntimeInstance, RuntimeError> {
        let program = locate_executable()?;
        let runtime_config = decode_runtime_config(&agent_config.runtime.config)?;

        let mut arguments = ClaudeArguments::streaming_defaults();
        arguments.apply_runtime_config(&runtime_config);
        arguments.apply_runtime_features(&agent_config.runtime.feature);
        arguments.apply_execution_input(input);

        spawn_instance(
            RuntimeKind::Claude,
            program,
            arguments.to_args(),
            execution_id,
            input,
            fold_event,
        )
    }

    fn discovery(&self) -> Result<bool, RuntimeError> {
        Ok(locate_executable().is_ok())
    }

    fn get_info(&self) -> Result<RuntimeInfo, RuntimeError> {
        let program = locate_executable()?;
        probe_version(RuntimeKind::Claude, &program)
    }

    fn default_config(&self) -> serde_json::Value {
        serde_json::json!({})
    }

    fn default_features(&self) -> RuntimeFeatures {
        RuntimeFeatures::default()
    }

    fn add_mcp_server(&self, name: &str, server: &McpServer) -> Result<(), RuntimeError> {
        config_file::add_server(name, server)
    }

    fn list_mcp_servers(&self) -> Result<BTreeMap<String, McpServer>, RuntimeError> {
        config_file::list_servers()
    }

    fn remove_mcp_server(&self, name: &str) -> Result<(), RuntimeError> {
        config_file::remove_server(name)
    }
}
