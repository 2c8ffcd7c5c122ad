use async_trait::async_trait;
use serde_json::Value;

use ticketeer_core::{FieldUpdates, IssueService, ServiceHandle};

use crate::args::{require_string, require_value, type_tag};
use crate::parameter::{ParameterType, ToolParameter};
use crate::tool::{Tool, ToolArguments, ToolError, ToolResult};
use crate::tools::names;

pub struct UpdateIssueTool {
    handle: ServiceHandle,
}

impl UpdateIssueTool {
    pub fn new(handle: ServiceHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Tool for UpdateIssueTool {
    fn name(&self) -> &str {
        names::UPDATE_ISSUE
    }

    fn description(&self) -> &str {
        "Change fields of an existing issue."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new("issue_key", ParameterType::String, "Issue key, e.g. OPS-12"),
            ToolParameter::new(
                "fields",
                ParameterType::Object,
                "Field name to new value, e.g. {\"priority\": \"High\"}",
            ),
        ]
    }

    async fn execute(&self, args: &ToolArguments) -> Result<ToolResult, ToolError> {
        let Some(service) = self.handle.get() else {
            return Ok(ToolResult::service_unavailable());
        };
        let issue_key = require_string(args, "issue_key")?;
        let fields = match require_value(args, "fields")? {
            Value::Object(fields) => fields.clone(),
            other => {
                return Err(ToolError::InvalidParameterType {
                    name: "fields".to_string(),
                    expected: "object".to_string(),
                    got: type_tag(other).to_string(),
                })
            }
        };
        update(service.as_ref(), &issue_key, &fields).await
    }
}

pub(crate) async fn update(
    service: &dyn IssueService,
    issue_key: &str,
    fields: &FieldUpdates,
) -> Result<ToolResult, ToolError> {
    if fields.is_empty() {
        return Ok(ToolResult::failure(format!("Nothing to update on {issue_key}")));
    }
    check_fields(fields)?;
    service.update(issue_key, fields).await?;
    let names: Vec<&str> = fields.keys().map(String::as_str).collect();
    Ok(ToolResult::ok(format!("Updated {issue_key} ({})", names.join(", "))))
}

/// Shape of the well-known fields. Unknown fields pass through untouched.
fn check_fields(fields: &FieldUpdates) -> Result<(), ToolError> {
    for (name, value) in fields {
        let expected = match name.as_str() {
            "summary" if !value.is_string() => "string",
            "description" | "priority" if !(value.is_string() || value.is_null()) => "string",
            "labels" if !is_string_list(value) => "array<string>",
            _ => continue,
        };
        return Err(ToolError::InvalidParameterType {
            name: format!("fields.{name}"),
            expected: expected.to_string(),
            got: type_tag(value).to_string(),
        });
    }
    Ok(())
}

fn is_string_list(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|items| items.iter().all(Value::is_string))
}
