use async_trait::async_trait;

use ticketeer_core::{IssueService, ServiceHandle};

use crate::args::require_string;
use crate::parameter::{ParameterType, ToolParameter};
use crate::tool::{Tool, ToolArguments, ToolError, ToolResult};
use crate::tools::names;

/// Move an issue through its workflow.
///
/// The available transitions are fetched first; a status that is not
/// reachable from the current one fails without calling `transition`.
pub struct TransitionIssueTool {
    handle: ServiceHandle,
}

impl TransitionIssueTool {
    pub fn new(handle: ServiceHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Tool for TransitionIssueTool {
    fn name(&self) -> &str {
        names::TRANSITION_ISSUE
    }

    fn description(&self) -> &str {
        "Change the status of an issue."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new("issue_key", ParameterType::String, "Issue key"),
            ToolParameter::new(
                "status",
                ParameterType::String,
                "Target status or transition name, e.g. In Progress",
            ),
        ]
    }

    async fn execute(&self, args: &ToolArguments) -> Result<ToolResult, ToolError> {
        let Some(service) = self.handle.get() else {
            return Ok(ToolResult::service_unavailable());
        };
        let issue_key = require_string(args, "issue_key")?;
        let status = require_string(args, "status")?;
        transition(service.as_ref(), &issue_key, &status).await
    }
}

pub(crate) async fn transition(
    service: &dyn IssueService,
    issue_key: &str,
    status: &str,
) -> Result<ToolResult, ToolError> {
    let available = service.fetch_transitions(issue_key).await?;
    let Some(chosen) = available.iter().find(|t| t.matches(status)) else {
        let options: Vec<String> = available
            .iter()
            .map(|t| format!("{} ({})", t.name, t.target_status))
            .collect();
        return Ok(ToolResult::failure(format!(
            "Cannot move {issue_key} to '{status}'. Available: {}",
            if options.is_empty() { "none".to_string() } else { options.join(", ") }
        )));
    };
    service.transition(issue_key, &chosen.name).await?;
    Ok(ToolResult::ok(format!("Moved {issue_key} to {}", chosen.target_status)))
}

pub struct GetTransitionsTool {
    handle: ServiceHandle,
}

impl GetTransitionsTool {
    pub fn new(handle: ServiceHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Tool for GetTransitionsTool {
    fn name(&self) -> &str {
        names::GET_TRANSITIONS
    }

    fn description(&self) -> &str {
        "List the status changes currently available for an issue."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::new("issue_key", ParameterType::String, "Issue key")]
    }

    async fn execute(&self, args: &ToolArguments) -> Result<ToolResult, ToolError> {
        let Some(service) = self.handle.get() else {
            return Ok(ToolResult::service_unavailable());
        };
        let issue_key = require_string(args, "issue_key")?;
        let transitions = service.fetch_transitions(&issue_key).await?;
        let mut message = format!("{} transitions available for {issue_key}", transitions.len());
        for t in &transitions {
            message.push_str(&format!("\n- {} -> {}", t.name, t.target_status));
        }
        let data =
            serde_json::to_value(&transitions).map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(ToolResult::ok_with_data(message, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixtures::{args, tracker};
    use serde_json::json;

    #[tokio::test]
    async fn test_transition_by_status_name() {
        let (t, _s, handle) = tracker();
        let result = TransitionIssueTool::new(handle)
            .execute(&args(json!({"issue_key": "OPS-1", "status": "in progress"})))
            .await
            .unwrap();
        assert_eq!(result.message.as_deref(), Some("Moved OPS-1 to In Progress"));
        assert_eq!(t.status_of("OPS-1").as_deref(), Some("In Progress"));
        assert_eq!(t.calls(), vec!["fetch_transitions", "transition"]);
    }

    #[tokio::test]
    async fn test_unreachable_status_skips_transition() {
        let (t, _s, handle) = tracker();
        let result = TransitionIssueTool::new(handle)
            .execute(&args(json!({"issue_key": "OPS-1", "status": "In Review"})))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.message.unwrap().contains("Start Progress (In Progress)"));
        assert_eq!(t.calls(), vec!["fetch_transitions"]);
        assert_eq!(t.status_of("OPS-1").as_deref(), Some("To Do"));
    }

    #[tokio::test]
    async fn test_get_transitions() {
        let (_t, _s, handle) = tracker();
        let result = GetTransitionsTool::new(handle)
            .execute(&args(json!({"issue_key": "OPS-3"})))
            .await
            .unwrap();
        assert!(result.message.unwrap().contains("Reopen -> To Do"));
    }
}
