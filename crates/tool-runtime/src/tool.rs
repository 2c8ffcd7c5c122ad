use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

use ticketeer_core::IssueServiceError;

use crate::args;
use crate::parameter::ToolParameter;

/// Arguments of a single call, keyed by parameter name.
pub type ToolArguments = Map<String, Value>;

/// Describes a tool's interface for LLM consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name (e.g., "search_issues")
    pub name: String,
    /// Human-readable description for the LLM
    pub description: String,
    /// `{type: "object", properties, required}`
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn from_parameters(name: &str, description: &str, parameters: &[ToolParameter]) -> Self {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in parameters {
            properties.insert(param.name().to_string(), param.to_schema());
            if param.is_required() {
                required.push(Value::String(param.name().to_string()));
            }
        }
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }

    /// Names listed under `parameters.required`.
    pub fn required_names(&self) -> Vec<&str> {
        self.parameters["required"]
            .as_array()
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

impl fmt::Display for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.description)
    }
}

/// Outcome of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    /// Human-readable text for the transcript
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Structured payload for programmatic consumers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn ok_with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Failure result for a collaborator that could not be reached.
    pub fn service_unavailable() -> Self {
        Self::failure("Issue service not available")
    }

    pub fn message_or_default(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or(if self.success { "Done" } else { "Failed" })
    }
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        ToolResult::failure(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("Missing required parameter '{0}'")]
    MissingRequiredParameter(String),
    #[error("Invalid type for parameter '{name}': expected {expected}, got {got}")]
    InvalidParameterType {
        name: String,
        expected: String,
        got: String,
    },
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl From<IssueServiceError> for ToolError {
    fn from(err: IssueServiceError) -> Self {
        ToolError::ExecutionFailed(err.to_string())
    }
}

/// The primary extension point: every invocable operation implements this.
///
/// Callers go through `CapabilityRegistry::execute`, which runs
/// [`Tool::validate`] before [`Tool::execute`], so `execute` may assume that
/// every required parameter is present and coercible.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Declared parameters, in presentation order.
    fn parameters(&self) -> Vec<ToolParameter>;

    /// Perform the operation. Preconditions are checked before any mutation.
    async fn execute(&self, args: &ToolArguments) -> Result<ToolResult, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::from_parameters(self.name(), self.description(), &self.parameters())
    }

    /// Check presence and coercibility of every declared parameter.
    fn validate(&self, args: &ToolArguments) -> Result<(), ToolError> {
        args::validate_arguments(&self.parameters(), args)
    }
}

/// Echoes back its `message` argument. For testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct EchoTool;

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the input message. For testing."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        use crate::parameter::ParameterType;
        vec![
            ToolParameter::new("message", ParameterType::String, "The message to echo back"),
            ToolParameter::optional("times", ParameterType::Integer, "Repeat count"),
        ]
    }

    async fn execute(&self, args: &ToolArguments) -> Result<ToolResult, ToolError> {
        let message = args::require_string(args, "message")?;
        let times = args::int_argument(args, "times")?.unwrap_or(1).max(1) as usize;
        Ok(ToolResult::ok(vec![message; times].join(" ")))
    }
}
