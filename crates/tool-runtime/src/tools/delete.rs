use async_trait::async_trait;
use tracing::info;

use ticketeer_core::{IssueService, ServiceHandle};

use crate::args::{require_bool, require_string};
use crate::parameter::{ParameterType, ToolParameter};
use crate::tool::{Tool, ToolArguments, ToolError, ToolResult};
use crate::tools::names;

/// Permanently delete an issue. Runs only with `confirm: true`.
pub struct DeleteIssueTool {
    handle: ServiceHandle,
}

impl DeleteIssueTool {
    pub fn new(handle: ServiceHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Tool for DeleteIssueTool {
    fn name(&self) -> &str {
        names::DELETE_ISSUE
    }

    fn description(&self) -> &str {
        "Permanently delete an issue. Only when the user explicitly asked for deletion."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new("issue_key", ParameterType::String, "Issue key"),
            ToolParameter::new("confirm", ParameterType::Boolean, "Must be true"),
        ]
    }

    async fn execute(&self, args: &ToolArguments) -> Result<ToolResult, ToolError> {
        let Some(service) = self.handle.get() else {
            return Ok(ToolResult::service_unavailable());
        };
        let issue_key = require_string(args, "issue_key")?;
        if !require_bool(args, "confirm")? {
            return Ok(ToolResult::failure(format!(
                "Deletion of {issue_key} not confirmed"
            )));
        }
        delete(service.as_ref(), &issue_key).await
    }
}

pub(crate) async fn delete(service: &dyn IssueService, issue_key: &str) -> Result<ToolResult, ToolError> {
    service.delete(issue_key).await?;
    info!(issue_key, "issue deleted");
    Ok(ToolResult::ok(format!("Deleted {issue_key}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixtures::{args, tracker};
    use serde_json::json;

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let (t, _s, handle) = tracker();
        let tool = DeleteIssueTool::new(handle);

        let refused = tool
            .execute(&args(json!({"issue_key": "OPS-3", "confirm": "yes"})))
            .await
            .unwrap();
        assert!(!refused.success);
        assert_eq!(t.issue_count(), 3);

        let done = tool
            .execute(&args(json!({"issue_key": "OPS-3", "confirm": "TRUE"})))
            .await
            .unwrap();
        assert_eq!(done.message.as_deref(), Some("Deleted OPS-3"));
        assert_eq!(t.issue_count(), 2);
    }
}
