use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::agent::{McpServer, RuntimeError};
use crate::shared::dirs::expand_home;
use crate::shared::fs_atomic::replace_via_tilde_temp;

pub const ENV_CONFIG_PATH: &str = "CLAUDE_CONFIG_PATH";

const DEFAULT_CONFIG_PATH: &str = "~/.claude.json";
const STDIO_TYPE: &str = "stdio";

/// The claude CLI's own config document (`~/.claude.json`). Only the
/// `mcpServers` subtree is interpreted; every other top-level field rides
/// along untouched through the flatten map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct ClaudeConfigDocument {
    #[serde(
        rename = "mcpServers",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub mcp_servers: BTreeMap<String, ClaudeMcpServerEntry>,

    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// One `mcpServers` entry. Non-stdio transports keep their unknown fields
/// through `other` and survive rewrites verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub(crate) struct ClaudeMcpServerEntry {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub transport: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

pub(crate) fn config_path() -> Result<PathBuf, RuntimeError> {
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        if !env_path.is_empty() {
            return absolutize(PathBuf::from(env_path));
        }
    }
    absolutize(expand_home(DEFAULT_CONFIG_PATH)?)
}

fn absolutize(path: PathBuf) -> Result<PathBuf, RuntimeError> {
    std::path::absolute(&path).map_err(|source| RuntimeError::McpConfigIo {
        path: path.display().to_string(),
        source,
    })
}

/// Reads the whole document. A missing or empty file is an empty document,
/// not an error.
pub(crate) fn read_document() -> Result<ClaudeConfigDocument, RuntimeError> {
    let path = config_path()?;
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ClaudeConfigDocument::default())
        }
        Err(source) => {
            return Err(RuntimeError::McpConfigIo {
                path: path.display().to_string(),
                source,
            })
        }
    };

    if raw.trim().is_empty() {
        return Ok(ClaudeConfigDocument::default());
    }

    serde_json::from_str(&raw).map_err(|source| RuntimeError::McpConfigInvalid {
        path: path.display().to_string(),
        message: source.to_string(),
    })
}

pub(crate) fn write_document(document: &ClaudeConfigDocument) -> Result<(), RuntimeError> {
    let path = config_path()?;
    let encoded =
        serde_json::to_vec_pretty(document).map_err(|source| RuntimeError::McpConfigInvalid {
            path: path.display().to_string(),
            message: source.to_string(),
        })?;
    replace_via_tilde_temp(&path, &encoded).map_err(|source| RuntimeError::McpConfigIo {
        path: path.display().to_string(),
        source,
    })
}

pub(crate) fn add_server(name: &str, server: &McpServer) -> Result<(), RuntimeError> {
    let McpServer::Stdio { command, args } = server;

    let mut document = read_document()?;
    document.mcp_servers.insert(
        name.to_string(),
        ClaudeMcpServerEntry {
            transport: STDIO_TYPE.to_string(),
            command: command.clone(),
            args: if args.is_empty() {
                None
            } else {
                Some(args.clone())
            },
            other: serde_json::Map::new(),
        },
    );
    write_document(&document)
}

/// Lists stdio entries only; other transports stay in the document but are
/// not part of the uniform view.
pub(crate) fn list_servers() -> Result<BTreeMap<String, McpServer>, RuntimeError> {
    let document = read_document()?;
    let mut servers = BTreeMap::new();
    for (name, entry) in &document.mcp_servers {
        if entry.transport != STDIO_TYPE {
            continue;
        }
        servers.insert(
            name.clone(),
            McpServer::Stdio {
                command: entry.command.clone(),
                args: entry.args.clone().unwrap_or_default(),
            },
        );
    }
    Ok(servers)
}

pub(crate) fn remove_server(name: &str) -> Result<(), RuntimeError> {
    let mut document = read_document()?;
    if document.mcp_servers.remove(name).is_none() {
        return Err(RuntimeError::McpServerNotFound {
            name: name.to_string(),
        });
    }
    write_document(&document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_unknown_top_level_fields() {
        let raw = r#"{
            "mcpServers": {
                "filesystem": {
                    "type": "stdio",
                    "command": "npx",
                    "args": ["-y", "@modelcontextprotocol/server-filesystem", "/code"],
                    "env": {"NODE_ENV": "production"}
                }
            },
            "theme": "dark",
            "font_size": 14,
            "telemetry": {"enabled": false}
        }"#;

        let document: ClaudeConfigDocument = serde_json::from_str(raw).expect("decode");
        let entry = document
            .mcp_servers
            .get("filesystem")
            .expect("filesystem entry");
        assert_eq!(entry.transport, "stdio");
        assert_eq!(entry.command, "npx");
        assert_eq!(entry.args.as_ref().map(Vec::len), Some(3));
        assert_eq!(entry.other["env"]["NODE_ENV"], "production");

        assert!(document.other.contains_key("theme"));
        assert!(document.other.contains_key("font_size"));
        assert!(document.other.contains_key("telemetry"));
        assert!(!document.other.contains_key("mcpServers"));
    }

    #[test]
    fn round_trip_preserves_unknown_fields() {
        let raw = r#"{
            "mcpServers": {"s1": {"type": "stdio", "command": "echo"}},
            "theme": "dark",
            "font_size": 14
        }"#;

        let mut document: ClaudeConfigDocument = serde_json::from_str(raw).expect("decode");
        document.mcp_servers.insert(
            "new-server".to_string(),
            ClaudeMcpServerEntry {
                transport: "stdio".to_string(),
                command: "python".to_string(),
                ..ClaudeMcpServerEntry::default()
            },
        );

        let encoded = serde_json::to_value(&document).expect("encode");
        assert_eq!(encoded["theme"], "dark");
        assert_eq!(encoded["font_size"], 14);
        assert!(encoded["mcpServers"]["s1"].is_object());
        assert!(encoded["mcpServers"]["new-server"].is_object());
    }

    #[test]
    fn document_with_only_unknown_fields_decodes() {
        let document: ClaudeConfigDocument =
            serde_json::from_str(r#"{"custom_setting": "value"}"#).expect("decode");
        assert!(document.mcp_servers.is_empty());
        assert!(document.other.contains_key("custom_setting"));
    }
}
