use async_trait::async_trait;
use tracing::debug;

use ticketeer_core::{IssueService, ServiceHandle};

use crate::args::{int_argument, require_string};
use crate::parameter::{ParameterType, ToolParameter};
use crate::tool::{Tool, ToolArguments, ToolError, ToolResult};
use crate::tools::names;

const DEFAULT_MAX_RESULTS: usize = 50;

/// Run a query and list the matches.
pub struct SearchIssuesTool {
    handle: ServiceHandle,
}

impl SearchIssuesTool {
    pub fn new(handle: ServiceHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Tool for SearchIssuesTool {
    fn name(&self) -> &str {
        names::SEARCH_ISSUES
    }

    fn description(&self) -> &str {
        "Find issues matching a JQL query."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new("jql", ParameterType::String, "JQL query, e.g. project = OPS AND status = \"To Do\""),
            ToolParameter::optional("max_results", ParameterType::Integer, "Maximum issues to list (default 50)"),
        ]
    }

    async fn execute(&self, args: &ToolArguments) -> Result<ToolResult, ToolError> {
        let Some(service) = self.handle.get() else {
            return Ok(ToolResult::service_unavailable());
        };
        let jql = require_string(args, "jql")?;
        let max_results = int_argument(args, "max_results")?
            .map(|n| n.max(1) as usize)
            .unwrap_or(DEFAULT_MAX_RESULTS);
        search(service.as_ref(), &jql, max_results).await
    }
}

pub(crate) async fn search(
    service: &dyn IssueService,
    jql: &str,
    max_results: usize,
) -> Result<ToolResult, ToolError> {
    let issues = service.search(jql).await?;
    debug!(jql, found = issues.len(), "search complete");

    if issues.is_empty() {
        return Ok(ToolResult::ok_with_data("No issues found", serde_json::json!([])));
    }

    let total = issues.len();
    let mut message = format!(
        "Found {} issue{}",
        total,
        if total == 1 { "" } else { "s" }
    );
    for issue in issues.iter().take(max_results) {
        message.push_str("\n- ");
        message.push_str(&issue.to_string());
    }
    if total > max_results {
        message.push_str(&format!("\n... and {} more", total - max_results));
    }
    let data = serde_json::to_value(&issues).map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
    Ok(ToolResult::ok_with_data(message, data))
}

/// Detail view of one issue, served by a key search.
pub(crate) async fn show_detail(service: &dyn IssueService, issue_key: &str) -> Result<ToolResult, ToolError> {
    let found = service.search(&format!("key = {issue_key}")).await?;
    match found.into_iter().next() {
        Some(issue) => {
            let mut message = issue.to_string();
            if !issue.issue_type.is_empty() {
                message.push_str(&format!("\nType: {}", issue.issue_type));
            }
            if let Some(priority) = &issue.priority {
                message.push_str(&format!("\nPriority: {priority}"));
            }
            let data = serde_json::to_value(&issue).map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            Ok(ToolResult::ok_with_data(message, data))
        }
        None => Ok(ToolResult::failure(format!("{issue_key} not found"))),
    }
}
