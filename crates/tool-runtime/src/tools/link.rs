use async_trait::async_trait;

use ticketeer_core::intent::default_link_type;
use ticketeer_core::{IssueService, ServiceHandle};

use crate::args::{require_string, string_argument};
use crate::parameter::{ParameterType, ToolParameter};
use crate::tool::{Tool, ToolArguments, ToolError, ToolResult};
use crate::tools::names;

pub struct LinkIssuesTool {
    handle: ServiceHandle,
}

impl LinkIssuesTool {
    pub fn new(handle: ServiceHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Tool for LinkIssuesTool {
    fn name(&self) -> &str {
        names::LINK_ISSUES
    }

    fn description(&self) -> &str {
        "Link two issues."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new("issue_key", ParameterType::String, "Source issue key"),
            ToolParameter::new("other_key", ParameterType::String, "Target issue key"),
            ToolParameter::optional(
                "link_type",
                ParameterType::String,
                "Blocks, Duplicates, Relates... (default Relates)",
            ),
        ]
    }

    async fn execute(&self, args: &ToolArguments) -> Result<ToolResult, ToolError> {
        let Some(service) = self.handle.get() else {
            return Ok(ToolResult::service_unavailable());
        };
        let issue_key = require_string(args, "issue_key")?;
        let other_key = require_string(args, "other_key")?;
        let link_type = string_argument(args, "link_type")?
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(default_link_type);
        link(service.as_ref(), &issue_key, &other_key, &link_type).await
    }
}

pub(crate) async fn link(
    service: &dyn IssueService,
    issue_key: &str,
    other_key: &str,
    link_type: &str,
) -> Result<ToolResult, ToolError> {
    if issue_key.eq_ignore_ascii_case(other_key) {
        return Ok(ToolResult::failure(format!("Cannot link {issue_key} to itself")));
    }
    service.link(issue_key, other_key, link_type).await?;
    Ok(ToolResult::ok(format!("Linked {issue_key} to {other_key} ({link_type})")))
}
