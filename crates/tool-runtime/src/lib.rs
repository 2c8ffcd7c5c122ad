pub mod args;
pub mod capability;
pub mod conversation;
pub mod executor;
pub mod parameter;
pub mod parser;
pub mod permission;
pub mod provider;
pub mod registry;
pub mod stream;
pub mod tool;
pub mod tools;
pub mod turn;

pub use capability::{Capability, StaticCapability};
pub use conversation::{ActionOutcome, Conversation, ConversationMessage};
pub use executor::{
    CancelFlag, ExecutionEvent, ExecutionReport, ExecutionStatus, IntentExecutor, RunContext,
};
pub use parameter::{ParameterType, ToolParameter};
pub use parser::{parse_actions, strip_action_lines, ActionInvocation, ActionParser, ACTION_MARKER};
pub use permission::{PermissionChecker, PermissionDecision, PermissionLevel, PermissionPolicy, PolicyChecker};
pub use provider::{LanguageModelClient, LlmError, ModelRequest, ScriptedModelClient};
pub use registry::CapabilityRegistry;
pub use stream::{CompletedResponse, ModelEvent, ResponseAccumulator, StreamError};
pub use tool::{Tool, ToolArguments, ToolDefinition, ToolError, ToolResult};
pub use tools::IssueTrackerCapability;
pub use turn::{TurnError, TurnOutcome, TurnRunner};
