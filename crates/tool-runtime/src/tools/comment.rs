use async_trait::async_trait;

use ticketeer_core::{IssueService, ServiceHandle};

use crate::args::require_string;
use crate::parameter::{ParameterType, ToolParameter};
use crate::tool::{Tool, ToolArguments, ToolError, ToolResult};
use crate::tools::names;

pub struct AddCommentTool {
    handle: ServiceHandle,
}

impl AddCommentTool {
    pub fn new(handle: ServiceHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Tool for AddCommentTool {
    fn name(&self) -> &str {
        names::ADD_COMMENT
    }

    fn description(&self) -> &str {
        "Add a comment to an issue."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new("issue_key", ParameterType::String, "Issue key"),
            ToolParameter::new("body", ParameterType::String, "Comment text"),
        ]
    }

    async fn execute(&self, args: &ToolArguments) -> Result<ToolResult, ToolError> {
        let Some(service) = self.handle.get() else {
            return Ok(ToolResult::service_unavailable());
        };
        let issue_key = require_string(args, "issue_key")?;
        let body = require_string(args, "body")?;
        comment(service.as_ref(), &issue_key, &body).await
    }
}

pub(crate) async fn comment(service: &dyn IssueService, issue_key: &str, body: &str) -> Result<ToolResult, ToolError> {
    if body.trim().is_empty() {
        return Ok(ToolResult::failure(format!("Empty comment not added to {issue_key}")));
    }
    service.comment(issue_key, body).await?;
    Ok(ToolResult::ok(format!("Commented on {issue_key}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixtures::{args, tracker};
    use serde_json::json;

    #[tokio::test]
    async fn test_add_comment() {
        let (t, _s, handle) = tracker();
        let result = AddCommentTool::new(handle)
            .execute(&args(json!({"issue_key": "OPS-1", "body": "Looking into it"})))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(t.comments_of("OPS-1"), vec!["Looking into it".to_string()]);
    }

    #[tokio::test]
    async fn test_service_failure_is_execution_failed() {
        let (t, _s, handle) = tracker();
        t.fail_on("comment");
        let err = AddCommentTool::new(handle)
            .execute(&args(json!({"issue_key": "OPS-1", "body": "hi"})))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ToolError::ExecutionFailed("API error: 500 - comment failed".to_string())
        );
    }
}
