use tracing::{debug, info, warn};

use crate::agent::{
    AgentConfig, AgentConfigError, AgentId, McpServer, Runtime, RuntimeError, RuntimeInfo,
    RuntimeKind,
};
use crate::runtime::RuntimeRegistry;
use crate::shared::dirs::{resolve_sibling_executable, DirsError, EXECUTABLE_MCP};
use crate::store::AgentConfigStore;

/// Name under which this orchestrator registers itself in each child
/// agent's MCP server config.
pub const MCP_SERVER_NAME: &str = "briefkit";

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    AgentConfig(#[from] AgentConfigError),
    #[error(transparent)]
    Dirs(#[from] DirsError),
    #[error("agent config {id} already exists")]
    AgentConfigExists { id: AgentId },
    #[error("{name} mcp server already exists in {kind} runtime")]
    McpServerExists { name: String, kind: RuntimeKind },
}

#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    /// Limit setup to these kinds; empty means every registered kind.
    pub runtime_kinds: Vec<RuntimeKind>,
    /// Override the default sandbox feature for all written agent configs.
    pub enable_sandbox: Option<bool>,
    /// Replace existing agent configs and MCP server entries.
    pub force: bool,
    pub skip_agent_config: bool,
    pub skip_agent_mcp: bool,
}

/// A runtime discovered on this host together with its probed version.
#[derive(Debug, Clone)]
pub struct DiscoveredRuntime {
    pub kind: RuntimeKind,
    pub info: RuntimeInfo,
}

/// Walks the registry and reports the kinds whose child binary is present.
/// Optionally writes a default agent config per discovered kind, keyed by
/// the kind name.
pub fn discover_agents(
    registry: &RuntimeRegistry,
    configs: &AgentConfigStore,
    write_default_config: bool,
) -> Result<Vec<DiscoveredRuntime>, SetupError> {
    let mut discovered = Vec::new();

    for kind in registry.list() {
        let runtime = registry.get(kind)?;

        debug!(runtime = %kind, "discovering runtime on system");
        if !runtime.discovery()? {
            warn!(runtime = %kind, "runtime not found on system");
            continue;
        }

        let info = runtime.get_info()?;
        info!(runtime = %kind, version = %info.version, "runtime discovered");

        if write_default_config {
            let agent_id = AgentId::from(kind);
            configs.update(&agent_id, &default_agent_config(runtime, None))?;
            info!(agent_id = %agent_id, "default agent configuration saved");
        }

        discovered.push(DiscoveredRuntime { kind, info });
    }

    Ok(discovered)
}

/// For every discovered kind: writes the default agent config and registers
/// this orchestrator's stdio front-end in the child agent's own MCP config.
/// Existing entries are only replaced with `force`.
pub fn setup_runtimes(
    registry: &RuntimeRegistry,
    configs: &AgentConfigStore,
    options: &SetupOptions,
) -> Result<(), SetupError> {
    for kind in registry.list() {
        if !options.runtime_kinds.is_empty() && !options.runtime_kinds.contains(&kind) {
            continue;
        }

        let runtime = registry.get(kind)?;
        if !runtime.discovery()? {
            warn!(runtime = %kind, "runtime not found on system");
            continue;
        }

        if options.skip_agent_config {
            warn!(runtime = %kind, "skipping agent configuration setup");
        } else {
            setup_agent_config(runtime, configs, options)?;
        }

        if options.skip_agent_mcp {
            warn!(runtime = %kind, "skipping agent mcp server setup");
        } else {
            setup_agent_mcp(runtime, options)?;
        }
    }

    Ok(())
}

fn default_agent_config(runtime: &dyn Runtime, enable_sandbox: Option<bool>) -> AgentConfig {
    let mut features = runtime.default_features();
    if enable_sandbox.is_some() {
        features.enable_sandbox = enable_sandbox;
    }
    AgentConfig::new(runtime.kind(), runtime.default_config(), features)
}

fn setup_agent_config(
    runtime: &dyn Runtime,
    configs: &AgentConfigStore,
    options: &SetupOptions,
) -> Result<(), SetupError> {
    let agent_id = AgentId::from(runtime.kind());

    if configs.exists(&agent_id)? && !options.force {
        return Err(SetupError::AgentConfigExists { id: agent_id });
    }

    if let Some(enabled) = options.enable_sandbox {
        if enabled {
            info!(runtime = %runtime.kind(), "enabling sandbox for runtime");
        } else {
            warn!(runtime = %runtime.kind(), "disabling sandbox for runtime");
        }
    }

    configs.update(&agent_id, &default_agent_config(runtime, options.enable_sandbox))?;
    info!(agent_id = %agent_id, "agent configuration saved");
    Ok(())
}

fn setup_agent_mcp(runtime: &dyn Runtime, options: &SetupOptions) -> Result<(), SetupError> {
    let servers = runtime.list_mcp_servers()?;

    if servers.contains_key(MCP_SERVER_NAME) {
        if !options.force {
            return Err(SetupError::McpServerExists {
                name: MCP_SERVER_NAME.to_string(),
                kind: runtime.kind(),
            });
        }
        runtime.remove_mcp_server(MCP_SERVER_NAME)?;
    }

    let command = resolve_sibling_executable(EXECUTABLE_MCP)?;
    runtime.add_mcp_server(
        MCP_SERVER_NAME,
        &McpServer::Stdio {
            command: command.display().to_string(),
            args: Vec::new(),
        },
    )?;
    info!(runtime = %runtime.kind(), server = MCP_SERVER_NAME, "mcp server registered");
    Ok(())
}
