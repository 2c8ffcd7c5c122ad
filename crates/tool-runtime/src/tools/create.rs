use async_trait::async_trait;
use serde_json::Value;

use ticketeer_core::{IssueService, NewIssue, ServiceHandle};

use crate::args::{string_argument, type_tag, value_argument};
use crate::parameter::{ParameterType, ToolParameter};
use crate::tool::{Tool, ToolArguments, ToolError, ToolResult};
use crate::tools::names;

pub struct CreateIssueTool {
    handle: ServiceHandle,
    default_project: Option<String>,
}

impl CreateIssueTool {
    pub fn new(handle: ServiceHandle) -> Self {
        Self {
            handle,
            default_project: None,
        }
    }

    /// With a default project, `project` becomes optional.
    pub fn with_default_project(mut self, project: Option<String>) -> Self {
        self.default_project = project;
        self
    }

    fn issue_from_args(&self, args: &ToolArguments) -> Result<NewIssue, ToolError> {
        let project = match string_argument(args, "project")? {
            Some(project) if !project.trim().is_empty() => project,
            _ => self
                .default_project
                .clone()
                .ok_or_else(|| ToolError::MissingRequiredParameter("project".to_string()))?,
        };
        let summary = string_argument(args, "summary")?
            .ok_or_else(|| ToolError::MissingRequiredParameter("summary".to_string()))?;

        let mut issue = NewIssue::new(project, summary);
        if let Some(issue_type) = string_argument(args, "issue_type")? {
            issue.issue_type = issue_type;
        }
        issue.description = string_argument(args, "description")?;
        issue.assignee = string_argument(args, "assignee")?;
        issue.priority = string_argument(args, "priority")?;
        issue.labels = labels_argument(args)?;
        Ok(issue)
    }
}

fn labels_argument(args: &ToolArguments) -> Result<Vec<String>, ToolError> {
    let invalid = |got: &Value| ToolError::InvalidParameterType {
        name: "labels".to_string(),
        expected: "array<string>".to_string(),
        got: type_tag(got).to_string(),
    };
    match value_argument(args, "labels") {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(String::from).ok_or_else(|| invalid(item)))
            .collect(),
        Some(other) => Err(invalid(other)),
    }
}

#[async_trait]
impl Tool for CreateIssueTool {
    fn name(&self) -> &str {
        names::CREATE_ISSUE
    }

    fn description(&self) -> &str {
        "Create a new issue."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        let project = match &self.default_project {
            Some(default) => ToolParameter::optional(
                "project",
                ParameterType::String,
                format!("Project key (default {default})"),
            ),
            None => ToolParameter::new("project", ParameterType::String, "Project key, e.g. OPS"),
        };
        vec![
            project,
            ToolParameter::new("summary", ParameterType::String, "One-line title"),
            ToolParameter::optional("issue_type", ParameterType::String, "Task, Bug, Story... (default Task)"),
            ToolParameter::optional("description", ParameterType::String, "Longer description"),
            ToolParameter::optional("assignee", ParameterType::String, "Username to assign"),
            ToolParameter::optional("priority", ParameterType::String, "Priority name"),
            ToolParameter::optional("labels", ParameterType::array_of(ParameterType::String), "Labels to apply"),
        ]
    }

    async fn execute(&self, args: &ToolArguments) -> Result<ToolResult, ToolError> {
        let Some(service) = self.handle.get() else {
            return Ok(ToolResult::service_unavailable());
        };
        let issue = self.issue_from_args(args)?;
        create(service.as_ref(), &issue).await
    }
}

pub(crate) async fn create(service: &dyn IssueService, issue: &NewIssue) -> Result<ToolResult, ToolError> {
    match service.create(issue).await? {
        Some(key) => Ok(ToolResult::ok_with_data(
            format!("Created {key}: {}", issue.summary),
            serde_json::json!({ "key": key }),
        )),
        None => Ok(ToolResult::ok(format!(
            "Created issue in {} (no key returned)",
            issue.project
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixtures::{args, tracker};
    use serde_json::json;

    #[tokio::test]
    async fn test_create_issue() {
        let (t, _s, handle) = tracker();
        let result = CreateIssueTool::new(handle)
            .execute(&args(json!({
                "project": "OPS",
                "summary": "Add alerts",
                "issue_type": "Story",
                "labels": ["monitoring"]
            })))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.message.as_deref(), Some("Created OPS-4: Add alerts"));
        assert_eq!(t.field_of("OPS-4", "labels"), Some(json!(["monitoring"])));
    }

    #[tokio::test]
    async fn test_default_project_makes_project_optional() {
        let (t, _s, handle) = tracker();
        let tool = CreateIssueTool::new(handle).with_default_project(Some("OPS".to_string()));
        assert!(!tool.parameters()[0].is_required());
        tool.execute(&args(json!({"summary": "Defaulted"}))).await.unwrap();
        assert_eq!(t.issue_count(), 4);
    }

    #[tokio::test]
    async fn test_labels_must_be_strings() {
        let (t, _s, handle) = tracker();
        let err = CreateIssueTool::new(handle)
            .execute(&args(json!({"project": "OPS", "summary": "x", "labels": ["ok", 3]})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameterType { ref name, .. } if name == "labels"));
        assert_eq!(t.issue_count(), 3);
    }
}
