use async_trait::async_trait;

use ticketeer_core::duration::{format_work_duration, parse_work_duration};
use ticketeer_core::{IssueService, ServiceHandle};

use crate::args::{int_argument, require_string, string_argument};
use crate::parameter::{ParameterType, ToolParameter};
use crate::tool::{Tool, ToolArguments, ToolError, ToolResult};
use crate::tools::names;

/// Log time against an issue, given as seconds or tracker notation.
pub struct LogWorkTool {
    handle: ServiceHandle,
}

impl LogWorkTool {
    pub fn new(handle: ServiceHandle) -> Self {
        Self { handle }
    }
}

/// `seconds` wins over `time_spent` when both are given.
fn seconds_from_args(args: &ToolArguments) -> Result<i64, ToolError> {
    if let Some(seconds) = int_argument(args, "seconds")? {
        return Ok(seconds);
    }
    match string_argument(args, "time_spent")? {
        Some(text) => parse_work_duration(&text)
            .map(|s| s.min(i64::MAX as u64) as i64)
            .map_err(|e| ToolError::InvalidParameterType {
                name: "time_spent".to_string(),
                expected: "duration like 1h 30m".to_string(),
                got: e.to_string(),
            }),
        None => Err(ToolError::MissingRequiredParameter(
            "seconds or time_spent".to_string(),
        )),
    }
}

#[async_trait]
impl Tool for LogWorkTool {
    fn name(&self) -> &str {
        names::LOG_WORK
    }

    fn description(&self) -> &str {
        "Log time spent on an issue. Give either seconds or time_spent."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new("issue_key", ParameterType::String, "Issue key"),
            ToolParameter::optional("seconds", ParameterType::Integer, "Time spent in seconds"),
            ToolParameter::optional(
                "time_spent",
                ParameterType::String,
                "Time spent, e.g. 1h 30m or 2d (1d = 8h)",
            ),
            ToolParameter::optional("comment", ParameterType::String, "Work description"),
        ]
    }

    async fn execute(&self, args: &ToolArguments) -> Result<ToolResult, ToolError> {
        let Some(service) = self.handle.get() else {
            return Ok(ToolResult::service_unavailable());
        };
        let issue_key = require_string(args, "issue_key")?;
        let seconds = seconds_from_args(args)?;
        if seconds <= 0 {
            return Ok(ToolResult::failure("Logged time must be positive"));
        }
        let comment = string_argument(args, "comment")?;
        log_work(service.as_ref(), &issue_key, seconds as u64, comment.as_deref()).await
    }
}

pub(crate) async fn log_work(
    service: &dyn IssueService,
    issue_key: &str,
    seconds: u64,
    comment: Option<&str>,
) -> Result<ToolResult, ToolError> {
    service.log_work(issue_key, seconds, comment).await?;
    Ok(ToolResult::ok(format!(
        "Logged {} on {issue_key}",
        format_work_duration(seconds)
    )))
}
