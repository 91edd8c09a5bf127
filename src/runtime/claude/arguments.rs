use serde::Deserialize;
use std::collections::BTreeMap;

use crate::agent::{ExecutionInput, RuntimeFeatures};

/// Runtime options specific to the claude CLI. Nothing is configurable
/// today; decoding still validates the opaque payload shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaudeRuntimeConfig {}

/// Ordered argument builder for the claude CLI. The streaming defaults pin
/// the output mode the scanner understands.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ClaudeArguments {
    pub print: bool,
    pub verbose: bool,
    pub output_format: Option<String>,
    pub model: Option<String>,
    pub resume_session_id: Option<String>,
    pub disallowed_tools: Vec<String>,
    pub settings: BTreeMap<String, serde_json::Value>,
}

impl ClaudeArguments {
    pub fn streaming_defaults() -> Self {
        Self {
            print: true,
            verbose: true,
            output_format: Some("stream-json".to_string()),
            ..Self::default()
        }
    }

    pub fn apply_runtime_config(&mut self, _config: &ClaudeRuntimeConfig) {}

    pub fn apply_runtime_features(&mut self, features: &RuntimeFeatures) {
        if features.enable_web_search == Some(false) {
            self.disallowed_tools.push("WebSearch".to_string());
        }
    }

    pub fn apply_execution_input(&mut self, input: &ExecutionInput) {
        if let Some(model) = &input.model {
            self.model = Some(model.clone());
        }
        if let Some(conversation_id) = &input.conversation_id {
            self.resume_session_id = Some(conversation_id.as_str().to_string());
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.print {
            args.push("--print".to_string());
        }
        if self.verbose {
            args.push("--verbose".to_string());
        }
        if let Some(output_format) = &self.output_format {
            args.push(format!("--output-format={output_format}"));
        }
        if let Some(model) = &self.model {
            args.push(format!("--model={model}"));
        }
        if let Some(resume) = &self.resume_session_id {
            args.push(format!("--resume={resume}"));
        }
        if !self.disallowed_tools.is_empty() {
            args.push(format!(
                "--disallowed-tools={}",
                self.disallowed_tools.join(",")
            ));
        }
        if !self.settings.is_empty() {
            if let Ok(settings_json) = serde_json::to_string(&self.settings) {
                args.push(format!("--settings={settings_json}"));
            }
        }

        args
    }
}
