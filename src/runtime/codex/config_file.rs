use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::agent::{McpServer, RuntimeError};
use crate::shared::dirs::expand_home;
use crate::shared::fs_atomic::replace_via_tilde_temp;

pub const ENV_CONFIG_PATH: &str = "CODEX_CONFIG_PATH";

const DEFAULT_CONFIG_PATH: &str = "~/.codex/config.toml";
const MCP_SERVERS_TABLE: &str = "mcp_servers";

fn config_path() -> Result<PathBuf, RuntimeError> {
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    Ok(expand_home(DEFAULT_CONFIG_PATH)?)
}

/// Reads the codex config as a TOML document tree so foreign keys and
/// tables survive edits untouched.
fn read_document() -> Result<(PathBuf, toml::Table), RuntimeError> {
    let path = config_path()?;
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            return Ok((path, toml::Table::new()))
        }
        Err(source) => {
            return Err(RuntimeError::McpConfigIo {
                path: path.display().to_string(),
                source,
            })
        }
    };

    let document = raw
        .parse::<toml::Table>()
        .map_err(|source| RuntimeError::McpConfigInvalid {
            path: path.display().to_string(),
            message: source.to_string(),
        })?;
    Ok((path, document))
}

fn write_document(path: &Path, document: &toml::Table) -> Result<(), RuntimeError> {
    let encoded =
        toml::to_string_pretty(document).map_err(|source| RuntimeError::McpConfigInvalid {
            path: path.display().to_string(),
            message: source.to_string(),
        })?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| RuntimeError::McpConfigIo {
            path: parent.display().to_string(),
            source,
        })?;
    }
    replace_via_tilde_temp(path, encoded.as_bytes()).map_err(|source| {
        RuntimeError::McpConfigIo {
            path: path.display().to_string(),
            source,
        }
    })
}

pub(crate) fn add_server(name: &str, server: &McpServer) -> Result<(), RuntimeError> {
    let McpServer::Stdio { command, args } = server;

    let (path, mut document) = read_document()?;

    let servers = document
        .entry(MCP_SERVERS_TABLE.to_string())
        .or_insert_with(|| toml::Value::Table(toml::Table::new()));
    let Some(servers) = servers.as_table_mut() else {
        return Err(RuntimeError::McpConfigInvalid {
            path: path.display().to_string(),
            message: format!("`{MCP_SERVERS_TABLE}` is not a table"),
        });
    };

    let mut entry = toml::Table::new();
    entry.insert("command".to_string(), toml::Value::String(command.clone()));
    if !args.is_empty() {
        entry.insert(
            "args".to_string(),
            toml::Value::Array(args.iter().cloned().map(toml::Value::String).collect()),
        );
    }
    servers.insert(name.to_string(), toml::Value::Table(entry));

    write_document(&path, &document)
}

/// Lists entries that carry a `command` (the stdio form); url-based entries
/// are preserved in the file but omitted here.
pub(crate) fn list_servers() -> Result<BTreeMap<String, McpServer>, RuntimeError> {
    let (_, document) = read_document()?;

    let mut servers = BTreeMap::new();
    let Some(table) = document.get(MCP_SERVERS_TABLE).and_then(toml::Value::as_table) else {
        return Ok(servers);
    };

    for (name, value) in table {
        let Some(entry) = value.as_table() else {
            continue;
        };
        if entry.contains_key("url") {
            continue;
        }
        let Some(command) = entry.get("command").and_then(toml::Value::as_str) else {
            continue;
        };
        let args = entry
            .get("args")
            .and_then(toml::Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(toml::Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        servers.insert(
            name.clone(),
            McpServer::Stdio {
                command: command.to_string(),
                args,
            },
        );
    }

    Ok(servers)
}

pub(crate) fn remove_server(name: &str) -> Result<(), RuntimeError> {
    let (path, mut document) = read_document()?;

    let removed = document
        .get_mut(MCP_SERVERS_TABLE)
        .and_then(toml::Value::as_table_mut)
        .and_then(|servers| servers.remove(name));
    if removed.is_none() {
        return Err(RuntimeError::McpServerNotFound {
            name: name.to_string(),
        });
    }

    write_document(&path, &document)
}
