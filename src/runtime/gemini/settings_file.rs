use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::agent::{McpServer, RuntimeError};
use crate::shared::dirs::expand_home;
use crate::shared::fs_atomic::replace_via_tilde_temp;

pub const ENV_CONFIG_PATH: &str = "GEMINI_CONFIG_PATH";

const DEFAULT_CONFIG_PATH: &str = "~/.gemini/settings.json";

/// The gemini CLI settings document. Only `mcpServers` is interpreted;
/// every other key is preserved verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GeminiSettingsDocument {
    #[serde(
        rename = "mcpServers",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    mcp_servers: BTreeMap<String, GeminiMcpServerEntry>,

    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}

/// One `mcpServers` entry. Gemini entries have no transport tag; an entry
/// with a `command` is stdio, entries with a url are something else.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GeminiMcpServerEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    args: Option<Vec<String>>,

    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}

impl GeminiMcpServerEntry {
    fn is_stdio(&self) -> bool {
        !self.command.is_empty() && !self.other.contains_key("url") && !self.other.contains_key("httpUrl")
    }
}

fn config_path() -> Result<PathBuf, RuntimeError> {
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    Ok(expand_home(DEFAULT_CONFIG_PATH)?)
}

fn read_document() -> Result<(PathBuf, GeminiSettingsDocument), RuntimeError> {
    let path = config_path()?;
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            return Ok((path, GeminiSettingsDocument::default()))
        }
        Err(source) => {
            return Err(RuntimeError::McpConfigIo {
                path: path.display().to_string(),
                source,
            })
        }
    };

    if raw.trim().is_empty() {
        return Ok((path, GeminiSettingsDocument::default()));
    }

    let document =
        serde_json::from_str(&raw).map_err(|source| RuntimeError::McpConfigInvalid {
            path: path.display().to_string(),
            message: source.to_string(),
        })?;
    Ok((path, document))
}

fn write_document(path: &Path, document: &GeminiSettingsDocument) -> Result<(), RuntimeError> {
    let encoded =
        serde_json::to_vec_pretty(document).map_err(|source| RuntimeError::McpConfigInvalid {
            path: path.display().to_string(),
            message: source.to_string(),
        })?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| RuntimeError::McpConfigIo {
            path: parent.display().to_string(),
            source,
        })?;
    }
    replace_via_tilde_temp(path, &encoded).map_err(|source| RuntimeError::McpConfigIo {
        path: path.display().to_string(),
        source,
    })
}

pub(crate) fn add_server(name: &str, server: &McpServer) -> Result<(), RuntimeError> {
    let McpServer::Stdio { command, args } = server;

    let (path, mut document) = read_document()?;
    document.mcp_servers.insert(
        name.to_string(),
        GeminiMcpServerEntry {
            command: command.clone(),
            args: if args.is_empty() {
                None
            } else {
                Some(args.clone())
            },
            other: serde_json::Map::new(),
        },
    );
    write_document(&path, &document)
}

pub(crate) fn list_servers() -> Result<BTreeMap<String, McpServer>, RuntimeError> {
    let (_, document) = read_document()?;
    let mut servers = BTreeMap::new();
    for (name, entry) in &document.mcp_servers {
        if !entry.is_stdio() {
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
    let (path, mut document) = read_document()?;
    if document.mcp_servers.remove(name).is_none() {
        return Err(RuntimeError::McpServerNotFound {
            name: name.to_string(),
        });
    }
    write_document(&path, &document)
}
