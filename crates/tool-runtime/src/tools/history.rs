use async_trait::async_trait;

use ticketeer_core::{IssueService, ServiceHandle};

use crate::args::require_string;
use crate::parameter::{ParameterType, ToolParameter};
use crate::tool::{Tool, ToolArguments, ToolError, ToolResult};
use crate::tools::names;

pub struct GetChangelogTool {
    handle: ServiceHandle,
}

impl GetChangelogTool {
    pub fn new(handle: ServiceHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Tool for GetChangelogTool {
    fn name(&self) -> &str {
        names::GET_CHANGELOG
    }

    fn description(&self) -> &str {
        "Show the change history of an issue."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::new("issue_key", ParameterType::String, "Issue key")]
    }

    async fn execute(&self, args: &ToolArguments) -> Result<ToolResult, ToolError> {
        let Some(service) = self.handle.get() else {
            return Ok(ToolResult::service_unavailable());
        };
        let issue_key = require_string(args, "issue_key")?;
        changelog(service.as_ref(), &issue_key).await
    }
}

pub(crate) async fn changelog(service: &dyn IssueService, issue_key: &str) -> Result<ToolResult, ToolError> {
    let entries = service.fetch_changelog(issue_key).await?;
    if entries.is_empty() {
        return Ok(ToolResult::ok_with_data(
            format!("{issue_key} has no recorded changes"),
            serde_json::json!([]),
        ));
    }
    let mut message = format!(
        "{issue_key} has {} change{}",
        entries.len(),
        if entries.len() == 1 { "" } else { "s" }
    );
    for entry in &entries {
        message.push_str("\n- ");
        message.push_str(&entry.to_string());
    }
    let data = serde_json::to_value(&entries).map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
    Ok(ToolResult::ok_with_data(message, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixtures::{args, tracker};
    use serde_json::json;

    #[tokio::test]
    async fn test_changelog_after_assign() {
        let (_t, service, handle) = tracker();
        let tool = GetChangelogTool::new(handle);

        let empty = tool.execute(&args(json!({"issue_key": "OPS-2"}))).await.unwrap();
        assert_eq!(empty.message.as_deref(), Some("OPS-2 has no recorded changes"));

        service.assign("OPS-2", "bo").await.unwrap();
        let result = tool.execute(&args(json!({"issue_key": "OPS-2"}))).await.unwrap();
        let message = result.message.unwrap();
        assert!(message.starts_with("OPS-2 has 1 change"));
        assert!(message.contains("changed assignee: (none) -> bo"));
    }
}
