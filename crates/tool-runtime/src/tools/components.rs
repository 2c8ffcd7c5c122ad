use async_trait::async_trait;

use ticketeer_core::ServiceHandle;

use crate::args::require_string;
use crate::parameter::{ParameterType, ToolParameter};
use crate::tool::{Tool, ToolArguments, ToolError, ToolResult};
use crate::tools::names;

pub struct GetComponentsTool {
    handle: ServiceHandle,
}

impl GetComponentsTool {
    pub fn new(handle: ServiceHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Tool for GetComponentsTool {
    fn name(&self) -> &str {
        names::GET_COMPONENTS
    }

    fn description(&self) -> &str {
        "List the components of a project."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::new("project", ParameterType::String, "Project key")]
    }

    async fn execute(&self, args: &ToolArguments) -> Result<ToolResult, ToolError> {
        let Some(service) = self.handle.get() else {
            return Ok(ToolResult::service_unavailable());
        };
        let project = require_string(args, "project")?;
        let components = service.fetch_components(&project).await?;

        let mut message = format!("{project} has {} components", components.len());
        for c in &components {
            message.push_str("\n- ");
            message.push_str(&c.name);
            if let Some(lead) = &c.lead {
                message.push_str(&format!(" (lead: {lead})"));
            }
        }
        let data =
            serde_json::to_value(&components).map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(ToolResult::ok_with_data(message, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixtures::{args, tracker};
    use serde_json::json;

    #[tokio::test]
    async fn test_list_components() {
        let (_t, _s, handle) = tracker();
        let result = GetComponentsTool::new(handle)
            .execute(&args(json!({"project": "ops"})))
            .await
            .unwrap();
        let message = result.message.unwrap();
        assert!(message.starts_with("ops has 2 components"));
        assert!(message.contains("- api (lead: ana)"));
    }

    #[tokio::test]
    async fn test_unknown_project() {
        let (_t, _s, handle) = tracker();
        assert!(GetComponentsTool::new(handle)
            .execute(&args(json!({"project": "NOPE"})))
            .await
            .is_err());
    }
}
