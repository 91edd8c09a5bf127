use briefkit::agent::{McpServer, Runtime, RuntimeError};
use briefkit::runtime::claude::{ClaudeRuntime, ENV_CONFIG_PATH as CLAUDE_CONFIG_PATH};
use briefkit::runtime::codex::{CodexRuntime, ENV_CONFIG_PATH as CODEX_CONFIG_PATH};
use briefkit::runtime::gemini::{GeminiRuntime, ENV_CONFIG_PATH as GEMINI_CONFIG_PATH};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::tempdir;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn stdio(command: &str) -> McpServer {
    McpServer::Stdio {
        command: command.to_string(),
        args: Vec::new(),
    }
}

#[test]
fn claude_edit_preserves_foreign_fields() {
    let _env = lock_env();
    let dir = tempdir().expect("tempdir");
    let config_path = dir.path().join("claude-test.json");
    fs::write(
        &config_path,
        r#"{
  "mcpServers": {
    "filesystem": {
      "type": "stdio",
      "command": "npx",
      "args": ["-y", "@modelcontextprotocol/server-filesystem", "/code"]
    }
  },
  "theme": "dark",
  "font_size": 14,
  "telemetry": {"enabled": false}
}"#,
    )
    .expect("seed config");
    std::env::set_var(CLAUDE_CONFIG_PATH, &config_path);

    let runtime = ClaudeRuntime::new();
    runtime
        .add_mcp_server("briefkit", &stdio("/usr/local/bin/briefkit-mcp"))
        .expect("add server");

    let decoded: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&config_path).expect("read")).expect("json");
    assert_eq!(decoded["theme"], "dark");
    assert_eq!(decoded["font_size"], 14);
    assert_eq!(decoded["telemetry"]["enabled"], false);
    assert_eq!(decoded["mcpServers"]["briefkit"]["type"], "stdio");
    assert_eq!(
        decoded["mcpServers"]["briefkit"]["command"],
        "/usr/local/bin/briefkit-mcp"
    );
    assert_eq!(decoded["mcpServers"]["filesystem"]["command"], "npx");

    runtime.remove_mcp_server("briefkit").expect("remove server");

    let decoded: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&config_path).expect("read")).expect("json");
    assert_eq!(decoded["theme"], "dark");
    assert_eq!(decoded["font_size"], 14);
    assert_eq!(decoded["telemetry"]["enabled"], false);
    assert!(decoded["mcpServers"].get("briefkit").is_none());
    assert!(decoded["mcpServers"].get("filesystem").is_some());

    assert!(
        !Path::new(&format!("{}~", config_path.display())).exists(),
        "tilde temp file must not survive"
    );

    std::env::remove_var(CLAUDE_CONFIG_PATH);
}

#[test]
fn claude_missing_file_reads_as_empty_and_add_creates_it() {
    let _env = lock_env();
    let dir = tempdir().expect("tempdir");
    let config_path = dir.path().join("claude-fresh.json");
    std::env::set_var(CLAUDE_CONFIG_PATH, &config_path);

    let runtime = ClaudeRuntime::new();
    assert!(runtime.list_mcp_servers().expect("list").is_empty());

    runtime
        .add_mcp_server("briefkit", &stdio("briefkit-mcp"))
        .expect("add");
    let servers = runtime.list_mcp_servers().expect("list");
    assert_eq!(servers.len(), 1);
    assert!(matches!(
        servers.get("briefkit"),
        Some(McpServer::Stdio { command, .. }) if command.as_str() == "briefkit-mcp"
    ));

    std::env::remove_var(CLAUDE_CONFIG_PATH);
}

#[test]
fn claude_listing_skips_non_stdio_but_keeps_them_on_disk() {
    let _env = lock_env();
    let dir = tempdir().expect("tempdir");
    let config_path = dir.path().join("claude-mixed.json");
    fs::write(
        &config_path,
        r#"{
  "mcpServers": {
    "local": {"type": "stdio", "command": "echo"},
    "remote": {"type": "sse", "url": "https://example.com/mcp"}
  }
}"#,
    )
    .expect("seed config");
    std::env::set_var(CLAUDE_CONFIG_PATH, &config_path);

    let runtime = ClaudeRuntime::new();
    let servers = runtime.list_mcp_servers().expect("list");
    assert_eq!(servers.len(), 1);
    assert!(servers.contains_key("local"));

    runtime
        .add_mcp_server("briefkit", &stdio("briefkit-mcp"))
        .expect("add");
    let decoded: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&config_path).expect("read")).expect("json");
    assert_eq!(decoded["mcpServers"]["remote"]["type"], "sse");
    assert_eq!(
        decoded["mcpServers"]["remote"]["url"],
        "https://example.com/mcp"
    );

    std::env::remove_var(CLAUDE_CONFIG_PATH);
}

#[test]
fn claude_remove_missing_server_errors() {
    let _env = lock_env();
    let dir = tempdir().expect("tempdir");
    let config_path = dir.path().join("claude-none.json");
    std::env::set_var(CLAUDE_CONFIG_PATH, &config_path);

    let runtime = ClaudeRuntime::new();
    let err = runtime
        .remove_mcp_server("briefkit")
        .expect_err("missing server");
    assert!(matches!(err, RuntimeError::McpServerNotFound { .. }));

    std::env::remove_var(CLAUDE_CONFIG_PATH);
}

#[test]
fn claude_refuses_invalid_json_document() {
    let _env = lock_env();
    let dir = tempdir().expect("tempdir");
    let config_path = dir.path().join("claude-broken.json");
    fs::write(&config_path, b"{not json").expect("seed config");
    std::env::set_var(CLAUDE_CONFIG_PATH, &config_path);

    let runtime = ClaudeRuntime::new();
    let err = runtime.list_mcp_servers().expect_err("invalid document");
    assert!(matches!(err, RuntimeError::McpConfigInvalid { .. }));

    std::env::remove_var(CLAUDE_CONFIG_PATH);
}

#[test]
fn codex_edit_preserves_foreign_tables() {
    let _env = lock_env();
    let dir = tempdir().expect("tempdir");
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"model = "gpt-5"
approval_policy = "never"

[sandbox_workspace_write]
network_access = true

[mcp_servers.existing]
command = "uvx"
args = ["some-server"]
"#,
    )
    .expect("seed config");
    std::env::set_var(CODEX_CONFIG_PATH, &config_path);

    let runtime = CodexRuntime::new();
    runtime
        .add_mcp_server("briefkit", &stdio("/usr/local/bin/briefkit-mcp"))
        .expect("add");

    let document: toml::Table = fs::read_to_string(&config_path)
        .expect("read")
        .parse()
        .expect("toml");
    assert_eq!(document["model"].as_str(), Some("gpt-5"));
    assert_eq!(document["approval_policy"].as_str(), Some("never"));
    assert_eq!(
        document["sandbox_workspace_write"]["network_access"].as_bool(),
        Some(true)
    );
    assert_eq!(
        document["mcp_servers"]["briefkit"]["command"].as_str(),
        Some("/usr/local/bin/briefkit-mcp")
    );
    assert_eq!(
        document["mcp_servers"]["existing"]["command"].as_str(),
        Some("uvx")
    );

    let servers = runtime.list_mcp_servers().expect("list");
    assert_eq!(servers.len(), 2);

    runtime.remove_mcp_server("briefkit").expect("remove");
    let document: toml::Table = fs::read_to_string(&config_path)
        .expect("read")
        .parse()
        .expect("toml");
    assert!(document["mcp_servers"].get("briefkit").is_none());
    assert_eq!(document["model"].as_str(), Some("gpt-5"));

    std::env::remove_var(CODEX_CONFIG_PATH);
}

#[test]
fn gemini_edit_preserves_foreign_fields_and_skips_url_entries() {
    let _env = lock_env();
    let dir = tempdir().expect("tempdir");
    let config_path = dir.path().join("settings.json");
    fs::write(
        &config_path,
        r#"{
  "selectedAuthType": "oauth-personal",
  "mcpServers": {
    "hosted": {"url": "https://example.com/mcp"}
  }
}"#,
    )
    .expect("seed config");
    std::env::set_var(GEMINI_CONFIG_PATH, &config_path);

    let runtime = GeminiRuntime::new();
    assert!(runtime.list_mcp_servers().expect("list").is_empty());

    runtime
        .add_mcp_server("briefkit", &stdio("briefkit-mcp"))
        .expect("add");

    let decoded: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&config_path).expect("read")).expect("json");
    assert_eq!(decoded["selectedAuthType"], "oauth-personal");
    assert_eq!(
        decoded["mcpServers"]["hosted"]["url"],
        "https://example.com/mcp"
    );
    assert_eq!(decoded["mcpServers"]["briefkit"]["command"], "briefkit-mcp");

    let servers = runtime.list_mcp_servers().expect("list");
    assert_eq!(servers.len(), 1);
    assert!(servers.contains_key("briefkit"));

    runtime.remove_mcp_server("briefkit").expect("remove");
    let err = runtime
        .remove_mcp_server("briefkit")
        .expect_err("second remove");
    assert!(matches!(err, RuntimeError::McpServerNotFound { .. }));

    std::env::remove_var(GEMINI_CONFIG_PATH);
}
