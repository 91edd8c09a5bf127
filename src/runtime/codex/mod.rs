mod config_file;

pub use config_file::ENV_CONFIG_PATH;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::agent::{
    AgentConfig, ConversationId, ExecutionId, ExecutionInput, McpServer, Runtime, RuntimeError,
    RuntimeFeatures, RuntimeInfo, RuntimeInstance, RuntimeKind, RuntimeResult,
};
use crate::shared::process::lookup_executable;

use super::arguments::{ArgValue, ArgumentSet};
use super::instance::spawn_instance;
use super::probe_version;

const EXECUTABLE_CANDIDATES: &[&str] = &["codex"];

/// Runtime options specific to the codex CLI.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodexRuntimeConfig {
    /// Requires the working directory to be a git repository. When false the
    /// child is started with `--skip-git-repo-check`.
    #[serde(default = "default_require_workspace_repository")]
    pub require_workspace_repository: bool,
}

fn default_require_workspace_repository() -> bool {
    true
}

impl Default for CodexRuntimeConfig {
    fn default() -> Self {
        Self {
            require_workspace_repository: true,
        }
    }
}

/// Adapter for the codex CLI: `exec --json` with the trailing `-` telling
/// the child to read the prompt from stdin. Conversation resume is the
/// positional `resume <id>` form.
pub struct CodexRuntime;

impl CodexRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CodexRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn locate_executable() -> Result<PathBuf, RuntimeError> {
    lookup_executable(EXECUTABLE_CANDIDATES).map_err(|source| RuntimeError::ExecutableNotFound {
        kind: RuntimeKind::Codex,
        source,
    })
}

fn decode_runtime_config(config: &serde_json::Value) -> Result<CodexRuntimeConfig, RuntimeError> {
    if config.is_null() {
        return Ok(CodexRuntimeConfig::default());
    }
    serde_json::from_value(config.clone()).map_err(|source| RuntimeError::ConfigDecode {
        kind: RuntimeKind::Codex,
        source,
    })
}

fn apply_runtime_config(
    arguments: &mut ArgumentSet,
    config: &CodexRuntimeConfig,
) -> Result<(), RuntimeError> {
    if !config.require_workspace_repository {
        arguments.set_flag("skip-git-repo-check");
    }
    Ok(())
}

fn apply_runtime_features(
    arguments: &mut ArgumentSet,
    features: &RuntimeFeatures,
) -> Result<(), RuntimeError> {
    if let Some(network_access) = features.enable_network_access {
        arguments.set_config_override(
            "sandbox_workspace_write.network_access",
            ArgValue::from(network_access),
        )?;
    }
    if let Some(web_search) = features.enable_web_search {
        arguments.set_config_override("features.web_search_request", ArgValue::from(web_search))?;
    }
    Ok(())
}

fn apply_execution_input(
    arguments: &mut ArgumentSet,
    input: &ExecutionInput,
) -> Result<(), RuntimeError> {
    if let Some(model) = &input.model {
        arguments.set_value("model", ArgValue::from(model.clone()))?;
    }
    Ok(())
}

fn build_argv(
    arguments: &ArgumentSet,
    conversation_id: Option<&ConversationId>,
) -> Vec<String> {
    let mut argv = vec!["exec".to_string()];
    argv.extend(arguments.to_args());
    if let Some(conversation_id) = conversation_id {
        argv.push("resume".to_string());
        argv.push(conversation_id.as_str().to_string());
    }
    argv.push("-".to_string());
    argv
}

/// codex emits one final `agent_message`; every occurrence overwrites the
/// response so the last one wins.
fn fold_event(result: &mut RuntimeResult, event: &serde_json::Value) {
    match event.get("type").and_then(serde_json::Value::as_str) {
        Some("thread.started") => {
            if let Some(thread_id) = event.get("thread_id").and_then(serde_json::Value::as_str) {
                if !thread_id.is_empty() {
                    result.conversation_id = ConversationId::new(thread_id);
                }
            }
        }
        Some("item.completed") => {
            let Some(item) = event.get("item") else {
                return;
            };
            if item.get("type").and_then(serde_json::Value::as_str) != Some("agent_message") {
                return;
            }
            if let Some(text) = item.get("text").and_then(serde_json::Value::as_str) {
                result.response = text.to_string();
            }
        }
        _ => {}
    }
}

impl Runtime for CodexRuntime {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Codex
    }

    fn execute(
        &self,
        execution_id: &ExecutionId,
        input: &ExecutionInput,
        agent_config: &AgentConfig,
    ) -> Result<RuntimeInstance, RuntimeError> {
        let program = locate_executable()?;
        let runtime_config = decode_runtime_config(&agent_config.runtime.config)?;

        let mut arguments = ArgumentSet::default();
        apply_runtime_config(&mut arguments, &runtime_config)?;
        apply_runtime_features(&mut arguments, &agent_config.runtime.feature)?;
        apply_execution_input(&mut arguments, input)?;
        // The scanner only understands the JSON event stream.
        arguments.set_flag("json");

        spawn_instance(
            RuntimeKind::Codex,
            program,
            build_argv(&arguments, input.conversation_id.as_ref()),
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
        probe_version(RuntimeKind::Codex, &program)
    }

    fn default_config(&self) -> serde_json::Value {
        serde_json::json!({ "requireWorkspaceRepository": true })
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
