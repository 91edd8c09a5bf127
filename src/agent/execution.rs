use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::shared::dirs::expand_home;
use crate::shared::duration::HumanDuration;

/// Identifies a single execution in the store. Always a canonical
/// hyphenated UUID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ExecutionId(String);

impl ExecutionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, ExecutionError> {
        // Uuid::parse_str also accepts braced and un-hyphenated forms; the
        // store only ever names directories with the canonical 36-char form.
        if raw.len() != 36 || Uuid::parse_str(raw).is_err() {
            return Err(ExecutionError::IdInvalid);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for ExecutionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(|_| D::Error::custom(format!("invalid execution id `{raw}`")))
    }
}

/// Opaque token emitted by a child agent that resumes the same dialogue in a
/// later execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    Created,
    Started,
    Running,
    Succeeded,
    Failed,
}

impl ExecutionState {
    pub fn is_finished(self) -> bool {
        matches!(self, ExecutionState::Succeeded | ExecutionState::Failed)
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExecutionState::Created => "created",
            ExecutionState::Started => "started",
            ExecutionState::Running => "running",
            ExecutionState::Succeeded => "succeeded",
            ExecutionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A single file supplied alongside the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionInputAttachment {
    pub mime_type: String,
    pub path: String,
}

impl ExecutionInputAttachment {
    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.mime_type.trim().is_empty() {
            return Err(ExecutionError::AttachmentMimeTypeRequired);
        }
        if self.path.trim().is_empty() {
            return Err(ExecutionError::AttachmentPathRequired);
        }
        Ok(())
    }
}

/// Everything the runner needs to drive one run of one agent. Immutable
/// after Create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionInput {
    /// Filesystem path where the child runs. When absent, the runner's own
    /// working directory is used.
    #[serde(default)]
    pub working_directory: Option<String>,

    pub timeout: HumanDuration,

    pub prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<ExecutionInputAttachment>,
}

impl ExecutionInput {
    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.prompt.trim().is_empty() {
            return Err(ExecutionError::PromptRequired);
        }

        if self.timeout.is_zero() {
            return Err(ExecutionError::TimeoutRequired);
        }

        if let Some(working_directory) = &self.working_directory {
            if working_directory.trim().is_empty() {
                return Err(ExecutionError::WorkingDirectoryRequired);
            }

            let expanded = expand_home(working_directory)
                .map_err(|_| ExecutionError::WorkingDirectoryInvalid)?;
            if !expanded.is_absolute() {
                return Err(ExecutionError::WorkingDirectoryNotAbsolute);
            }
        }

        for attachment in &self.attachments {
            attachment.validate()?;
        }

        Ok(())
    }
}

/// Lifecycle record for an execution; rewritten by the runner on every
/// transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStatus {
    pub state: ExecutionState,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionStatus {
    pub fn new_created(now: DateTime<Utc>) -> Self {
        Self {
            state: ExecutionState::Created,
            created_at: now,
            updated_at: now,
            finished_at: None,
            attempts: 0,
            exit_code: None,
            error: None,
        }
    }
}

/// Final outcome of a succeeded execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    #[serde(default)]
    pub conversation_id: ConversationId,

    pub response: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("execution id invalid")]
    IdInvalid,
    #[error("execution not found")]
    NotFound,
    #[error("execution result not found")]
    NoResult,
    #[error("execution agent config not found")]
    AgentConfigNotFound,
    #[error("execution prompt required")]
    PromptRequired,
    #[error("execution timeout required")]
    TimeoutRequired,
    #[error("execution working directory required")]
    WorkingDirectoryRequired,
    #[error("execution working directory invalid")]
    WorkingDirectoryInvalid,
    #[error("execution working directory not absolute")]
    WorkingDirectoryNotAbsolute,
    #[error("execution attachment mime type required")]
    AttachmentMimeTypeRequired,
    #[error("execution attachment path required")]
    AttachmentPathRequired,
    #[error("execution store io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid execution record at {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode execution record: {0}")]
    Encode(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn valid_input() -> ExecutionInput {
        ExecutionInput {
            working_directory: Some("/app".to_string()),
            timeout: HumanDuration::new(Duration::from_secs(300)),
            prompt: "hello".to_string(),
            model: None,
            conversation_id: None,
            attachments: Vec::new(),
        }
    }

    #[test]
    fn generated_ids_are_valid_and_unique() {
        let id = ExecutionId::generate();
        assert!(ExecutionId::parse(id.as_str()).is_ok());
        assert_ne!(id, ExecutionId::generate());
    }

    #[test]
    fn id_rejects_non_canonical_forms() {
        assert!(matches!(
            ExecutionId::parse(""),
            Err(ExecutionError::IdInvalid)
        ));
        assert!(matches!(
            ExecutionId::parse("not-a-uuid"),
            Err(ExecutionError::IdInvalid)
        ));
        // un-hyphenated hex parses as a UUID but is not the canonical form
        assert!(matches!(
            ExecutionId::parse("67e5504410b1426f9247bb680e5fe0c8"),
            Err(ExecutionError::IdInvalid)
        ));
        assert!(ExecutionId::parse("67e55044-10b1-426f-9247-bb680e5fe0c8").is_ok());
    }

    #[test]
    fn state_is_finished_only_for_terminal_states() {
        assert!(!ExecutionState::Created.is_finished());
        assert!(!ExecutionState::Started.is_finished());
        assert!(!ExecutionState::Running.is_finished());
        assert!(ExecutionState::Succeeded.is_finished());
        assert!(ExecutionState::Failed.is_finished());
    }

    #[test]
    fn input_requires_trimmed_prompt() {
        let mut input = valid_input();
        input.prompt = "   ".to_string();
        assert!(matches!(
            input.validate(),
            Err(ExecutionError::PromptRequired)
        ));
    }

    #[test]
    fn input_requires_positive_timeout() {
        let mut input = valid_input();
        input.timeout = HumanDuration::ZERO;
        assert!(matches!(
            input.validate(),
            Err(ExecutionError::TimeoutRequired)
        ));
    }

    #[test]
    fn input_accepts_absent_working_directory() {
        let mut input = valid_input();
        input.working_directory = None;
        assert!(input.validate().is_ok());
    }

    #[test]
    fn input_rejects_blank_working_directory() {
        let mut input = valid_input();
        input.working_directory = Some(" ".to_string());
        assert!(matches!(
            input.validate(),
            Err(ExecutionError::WorkingDirectoryRequired)
        ));
    }

    #[test]
    fn input_rejects_relative_working_directory() {
        let mut input = valid_input();
        input.working_directory = Some("relative/path".to_string());
        assert!(matches!(
            input.validate(),
            Err(ExecutionError::WorkingDirectoryNotAbsolute)
        ));
    }

    #[test]
    fn input_validates_attachments() {
        let mut input = valid_input();
        input.attachments = vec![ExecutionInputAttachment {
            mime_type: String::new(),
            path: "/tmp/file.png".to_string(),
        }];
        assert!(matches!(
            input.validate(),
            Err(ExecutionError::AttachmentMimeTypeRequired)
        ));

        input.attachments = vec![ExecutionInputAttachment {
            mime_type: "image/png".to_string(),
            path: "  ".to_string(),
        }];
        assert!(matches!(
            input.validate(),
            Err(ExecutionError::AttachmentPathRequired)
        ));
    }

    #[test]
    fn status_serializes_without_absent_fields() {
        let status = ExecutionStatus::new_created(Utc::now());
        let encoded = serde_json::to_string(&status).expect("encode");
        assert!(!encoded.contains("finishedAt"));
        assert!(!encoded.contains("exitCode"));
        assert!(!encoded.contains("error"));
        assert!(encoded.contains("\"state\":\"created\""));
    }
}
