pub mod config;
pub mod execution;
pub mod runtime;

pub use config::{AgentConfig, AgentConfigError, AgentId, AgentRuntimeConfig, RuntimeFeatures};
pub use execution::{
    ConversationId, ExecutionError, ExecutionId, ExecutionInput, ExecutionInputAttachment,
    ExecutionResult, ExecutionState, ExecutionStatus,
};
pub use runtime::{
    McpServer, Runtime, RuntimeError, RuntimeEvent, RuntimeExecutionError, RuntimeInfo,
    RuntimeInstance, RuntimeKind, RuntimeResult,
};
