use async_trait::async_trait;

use ticketeer_core::{IssueService, ServiceHandle};

use crate::args::require_string;
use crate::parameter::{ParameterType, ToolParameter};
use crate::tool::{Tool, ToolArguments, ToolError, ToolResult};
use crate::tools::names;

pub struct AssignIssueTool {
    handle: ServiceHandle,
}

impl AssignIssueTool {
    pub fn new(handle: ServiceHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Tool for AssignIssueTool {
    fn name(&self) -> &str {
        names::ASSIGN_ISSUE
    }

    fn description(&self) -> &str {
        "Assign an issue to a user. Use \"unassigned\" to clear."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new("issue_key", ParameterType::String, "Issue key"),
            ToolParameter::new("assignee", ParameterType::String, "Username"),
        ]
    }

    async fn execute(&self, args: &ToolArguments) -> Result<ToolResult, ToolError> {
        let Some(service) = self.handle.get() else {
            return Ok(ToolResult::service_unavailable());
        };
        let issue_key = require_string(args, "issue_key")?;
        let assignee = require_string(args, "assignee")?;
        assign(service.as_ref(), &issue_key, &assignee).await
    }
}

pub(crate) async fn assign(service: &dyn IssueService, issue_key: &str, assignee: &str) -> Result<ToolResult, ToolError> {
    service.assign(issue_key, assignee).await?;
    if assignee.is_empty() || assignee.eq_ignore_ascii_case("unassigned") {
        Ok(ToolResult::ok(format!("Unassigned {issue_key}")))
    } else {
        Ok(ToolResult::ok(format!("Assigned {issue_key} to {assignee}")))
    }
}

pub struct AddWatcherTool {
    handle: ServiceHandle,
}

impl AddWatcherTool {
    pub fn new(handle: ServiceHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Tool for AddWatcherTool {
    fn name(&self) -> &str {
        names::ADD_WATCHER
    }

    fn description(&self) -> &str {
        "Add a user to an issue's watchers."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new("issue_key", ParameterType::String, "Issue key"),
            ToolParameter::new("watcher", ParameterType::String, "Username"),
        ]
    }

    async fn execute(&self, args: &ToolArguments) -> Result<ToolResult, ToolError> {
        let Some(service) = self.handle.get() else {
            return Ok(ToolResult::service_unavailable());
        };
        let issue_key = require_string(args, "issue_key")?;
        let watcher = require_string(args, "watcher")?;
        add_watcher(service.as_ref(), &issue_key, &watcher).await
    }
}

pub(crate) async fn add_watcher(
    service: &dyn IssueService,
    issue_key: &str,
    watcher: &str,
) -> Result<ToolResult, ToolError> {
    service.add_watcher(issue_key, watcher).await?;
    Ok(ToolResult::ok(format!("Added {watcher} as watcher on {issue_key}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixtures::{args, tracker};
    use serde_json::json;

    #[tokio::test]
    async fn test_assign_and_unassign() {
        let (t, _s, handle) = tracker();
        let tool = AssignIssueTool::new(handle);
        let result = tool
            .execute(&args(json!({"issue_key": "OPS-2", "assignee": "bo"})))
            .await
            .unwrap();
        assert_eq!(result.message.as_deref(), Some("Assigned OPS-2 to bo"));
        assert_eq!(t.assignee_of("OPS-2").as_deref(), Some("bo"));

        tool.execute(&args(json!({"issue_key": "OPS-2", "assignee": "Unassigned"})))
            .await
            .unwrap();
        assert_eq!(t.assignee_of("OPS-2"), None);
    }

    #[tokio::test]
    async fn test_add_watcher() {
        let (t, _s, handle) = tracker();
        AddWatcherTool::new(handle)
            .execute(&args(json!({"issue_key": "OPS-1", "watcher": "cy"})))
            .await
            .unwrap();
        assert_eq!(t.watchers_of("OPS-1"), vec!["cy".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_issue() {
        let (_t, _s, handle) = tracker();
        let err = AssignIssueTool::new(handle)
            .execute(&args(json!({"issue_key": "NOPE-1", "assignee": "bo"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(ref m) if m.contains("NOPE-1")));
    }
}
