use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::agent::runtime::RuntimeKind;

/// Identifies an agent configuration file. Lowercase, `[a-z][a-z0-9-]*`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn parse(raw: &str) -> Result<Self, AgentConfigError> {
        let mut chars = raw.chars();
        let valid_head = matches!(chars.next(), Some(ch) if ch.is_ascii_lowercase());
        let valid_tail =
            chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-');
        if !valid_head || !valid_tail {
            return Err(AgentConfigError::IdInvalid);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<RuntimeKind> for AgentId {
    fn from(kind: RuntimeKind) -> Self {
        // Kind names satisfy the agent id shape by construction.
        Self(kind.as_str().to_string())
    }
}

impl<'de> Deserialize<'de> for AgentId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(|_| D::Error::custom(format!("invalid agent id `{raw}`")))
    }
}

/// Tri-state feature switches. Absent means "adapter default" and is
/// distinct from an explicit `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_web_search: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_network_access: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_sandbox: Option<bool>,
}

/// Binds a runtime kind to its opaque kind-specific config and feature
/// switches. The `config` payload is decoded by the matching adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRuntimeConfig {
    pub kind: RuntimeKind,

    #[serde(default)]
    pub config: serde_json::Value,

    #[serde(default, skip_serializing_if = "features_unset")]
    pub feature: RuntimeFeatures,
}

fn features_unset(features: &RuntimeFeatures) -> bool {
    *features == RuntimeFeatures::default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub runtime: AgentRuntimeConfig,
}

impl AgentConfig {
    pub fn new(kind: RuntimeKind, config: serde_json::Value, feature: RuntimeFeatures) -> Self {
        Self {
            runtime: AgentRuntimeConfig {
                kind,
                config,
                feature,
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentConfigError {
    #[error("agent id invalid")]
    IdInvalid,
    #[error("agent config not found")]
    NotFound,
    #[error("agent config io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid agent config at {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to encode agent config: {0}")]
    Encode(#[source] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_id_accepts_lowercase_hyphenated_names() {
        for raw in ["claude", "claude-code", "a", "agent-2"] {
            assert!(AgentId::parse(raw).is_ok(), "{raw} should parse");
        }
    }

    #[test]
    fn agent_id_rejects_other_shapes() {
        for raw in ["", "Codex", "2agent", "-agent", "agent_one", "agent one"] {
            assert!(
                matches!(AgentId::parse(raw), Err(AgentConfigError::IdInvalid)),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn features_keep_absent_distinct_from_false() {
        let absent: RuntimeFeatures = serde_yaml::from_str("{}").expect("empty mapping");
        assert_eq!(absent.enable_web_search, None);

        let explicit: RuntimeFeatures =
            serde_yaml::from_str("enableWebSearch: false").expect("explicit false");
        assert_eq!(explicit.enable_web_search, Some(false));

        let encoded = serde_yaml::to_string(&absent).expect("encode");
        assert!(!encoded.contains("enableWebSearch"));
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let config = AgentConfig::new(
            RuntimeKind::Codex,
            serde_json::json!({"requireWorkspaceRepository": false}),
            RuntimeFeatures {
                enable_web_search: Some(true),
                enable_network_access: None,
                enable_sandbox: None,
            },
        );
        let encoded = serde_yaml::to_string(&config).expect("encode");
        let decoded: AgentConfig = serde_yaml::from_str(&encoded).expect("decode");
        assert_eq!(decoded, config);
    }
}
