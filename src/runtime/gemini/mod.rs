mod settings_file;

pub use settings_file::ENV_CONFIG_PATH;

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

const EXECUTABLE_CANDIDATES: &[&str] = &["gemini"];

/// Runtime options specific to the gemini CLI. None exist today; decoding
/// still validates the opaque payload shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiRuntimeConfig {}

/// Adapter for the gemini CLI: `--output-format=stream-json` with the
/// prompt piped on stdin.
pub struct GeminiRuntime;

impl GeminiRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GeminiRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn locate_executable() -> Result<PathBuf, RuntimeError> {
    lookup_executable(EXECUTABLE_CANDIDATES).map_err(|source| RuntimeError::ExecutableNotFound {
        kind: RuntimeKind::Gemini,
        source,
    })
}

fn decode_runtime_config(config: &serde_json::Value) -> Result<GeminiRuntimeConfig, RuntimeError> {
    if config.is_null() {
        return Ok(GeminiRuntimeConfig::default());
    }
    serde_json::from_value(config.clone()).map_err(|source| RuntimeError::ConfigDecode {
        kind: RuntimeKind::Gemini,
        source,
    })
}

fn apply_runtime_features(
    arguments: &mut ArgumentSet,
    features: &RuntimeFeatures,
) -> Result<(), RuntimeError> {
    // Denying network access maps onto the CLI's sandbox flag; there is no
    // positive "allow" form to emit.
    if features.enable_network_access == Some(false) {
        arguments.set_flag("sandbox");
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
    if let Some(conversation_id) = &input.conversation_id {
        arguments.set_value("resume", ArgValue::from(conversation_id.as_str()))?;
    }
    Ok(())
}

/// gemini only streams; assistant message content is appended as it
/// arrives and there is no terminal overwrite event.
fn fold_event(result: &mut RuntimeResult, event: &serde_json::Value) {
    match event.get("type").and_then(serde_json::Value::as_str) {
        Some("init") => {
            if let Some(session_id) = event.get("session_id").and_then(serde_json::Value::as_str) {
                if !session_id.is_empty() {
                    result.conversation_id = ConversationId::new(session_id);
                }
            }
        }
        Some("message") => {
            if event.get("role").and_then(serde_json::Value::as_str) != Some("assistant") {
                return;
            }
            if let Some(content) = event.get("content").and_then(serde_json::Value::as_str) {
                result.response.push_str(content);
            }
        }
        _ => {}
    }
}

impl Runtime for GeminiRuntime {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Gemini
    }

    fn execute(
        &self,
        execution_id: &ExecutionId,
        input: &ExecutionInput,
        agent_config: &AgentConfig,
    ) -> Result<RuntimeInstance, RuntimeError> {
        let program = locate_executable()?;
        decode_runtime_config(&agent_config.runtime.config)?;

        let mut arguments = ArgumentSet::default();
        apply_runtime_features(&mut arguments, &agent_config.runtime.feature)?;
        apply_execution_input(&mut arguments, input)?;
        arguments.set_value("output-format", ArgValue::from("stream-json"))?;

        spawn_instance(
            RuntimeKind::Gemini,
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
        probe_version(RuntimeKind::Gemini, &program)
    }

    fn default_config(&self) -> serde_json::Value {
        serde_json::json!({})
    }

    fn default_features(&self) -> RuntimeFeatures {
        RuntimeFeatures::default()
    }

    fn add_mcp_server(&self, name: &str, server: &McpServer) -> Result<(), RuntimeError> {
        settings_file::add_server(name, server)
    }

    fn list_mcp_servers(&self) -> Result<BTreeMap<String, McpServer>, RuntimeError> {
        settings_file::list_servers()
    }

    fn remove_mcp_server(&self, name: &str) -> Result<(), RuntimeError> {
        settings_file::remove_server(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::duration::HumanDuration;

    #[test]
    fn network_access_false_adds_sandbox_flag() {
        let mut arguments = ArgumentSet::default();
        apply_runtime_features(
            &mut arguments,
            &RuntimeFeatures {
                enable_network_access: Some(false),
                ..RuntimeFeatures::default()
            },
        )
        .expect("features");
        assert_eq!(arguments.to_args(), vec!["--sandbox"]);
    }

    #[test]
    fn network_access_true_or_absent_adds_nothing() {
        for enable_network_access in [Some(true), None] {
            let mut arguments = ArgumentSet::default();
            apply_runtime_features(
                &mut arguments,
                &RuntimeFeatures {
                    enable_network_access,
                    ..RuntimeFeatures::default()
                },
            )
            .expect("features");
            assert!(arguments.to_args().is_empty());
        }
    }

    #[test]
    fn model_and_resume_render_as_values() {
        let mut arguments = ArgumentSet::default();
        let input = ExecutionInput {
            working_directory: None,
            timeout: HumanDuration::from_secs(300),
            prompt: "hi".to_string(),
            model: Some("gemini-pro".to_string()),
            conversation_id: Some(ConversationId::new("sess-9")),
            attachments: Vec::new(),
        };
        apply_execution_input(&mut arguments, &input).expect("input");
        assert_eq!(
            arguments.to_args(),
            vec!["--model=gemini-pro", "--resume=sess-9"]
        );
    }

    #[test]
    fn assistant_messages_append() {
        let mut result = RuntimeResult::default();
        for line in [
            r#"{"type":"init","session_id":"gem-1"}"#,
            r#"{"type":"message","role":"assistant","content":"Hello, "}"#,
            r#"{"type":"message","role":"user","content":"ignored"}"#,
            r#"{"type":"message","role":"assistant","content":"world"}"#,
        ] {
            let event: serde_json::Value = serde_json::from_str(line).expect("event");
            fold_event(&mut result, &event);
        }
        assert_eq!(result.conversation_id.as_str(), "gem-1");
        assert_eq!(result.response, "Hello, world");
    }
}
