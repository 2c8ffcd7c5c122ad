//! Extraction of action lines from model output.
//!
//! Wire format, one call per line:
//!
//! ```text
//! ACTION: {"tool": "search_issues", "args": {"jql": "project = X"}}
//! ```
//!
//! Parsing works on the final assembled text only. Malformed action lines are
//! skipped with a warning; they never discard the valid lines around them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::tool::ToolArguments;

pub const ACTION_MARKER: &str = "ACTION:";

/// A registry-level call parsed from model text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInvocation {
    pub tool: String,
    pub args: ToolArguments,
}

impl ActionInvocation {
    /// Render back into the wire format.
    pub fn to_action_line(&self) -> String {
        format!(
            "{ACTION_MARKER} {}",
            json!({ "tool": self.tool, "args": self.args })
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionParseError {
    #[error("action body is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("action body is not a JSON object")]
    NotAnObject,
    #[error("action is missing a string 'tool' field")]
    MissingTool,
    #[error("action is missing an 'args' object")]
    MissingArgs,
    #[error("action 'args' must be an object")]
    InvalidArgs,
}

#[derive(Debug, Clone)]
pub struct ActionParser {
    marker: String,
}

impl Default for ActionParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionParser {
    pub fn new() -> Self {
        Self {
            marker: ACTION_MARKER.to_string(),
        }
    }

    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    fn action_body<'a>(&self, line: &'a str) -> Option<&'a str> {
        line.trim_start().strip_prefix(self.marker.as_str())
    }

    pub fn is_action_line(&self, line: &str) -> bool {
        self.action_body(line).is_some()
    }

    /// Parse one line. `Ok(None)` means the line is not an action line.
    ///
    /// Text after the JSON object on the same line is ignored.
    pub fn parse_line(&self, line: &str) -> Result<Option<ActionInvocation>, ActionParseError> {
        let Some(body) = self.action_body(line) else {
            return Ok(None);
        };
        let value = serde_json::Deserializer::from_str(body.trim())
            .into_iter::<Value>()
            .next()
            .ok_or_else(|| ActionParseError::InvalidJson("empty body".to_string()))?
            .map_err(|e| ActionParseError::InvalidJson(e.to_string()))?;

        let Value::Object(mut object) = value else {
            return Err(ActionParseError::NotAnObject);
        };
        let tool = match object.remove("tool") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
            _ => return Err(ActionParseError::MissingTool),
        };
        let args = match object.remove("args") {
            None => return Err(ActionParseError::MissingArgs),
            Some(Value::Object(args)) => args,
            Some(_) => return Err(ActionParseError::InvalidArgs),
        };
        Ok(Some(ActionInvocation { tool, args }))
    }

    /// Every well-formed action in `text`, in order of appearance.
    pub fn parse(&self, text: &str) -> Vec<ActionInvocation> {
        let mut actions = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            match self.parse_line(line) {
                Ok(Some(action)) => {
                    debug!(line = line_no + 1, tool = %action.tool, "parsed action");
                    actions.push(action);
                }
                Ok(None) => {}
                Err(e) => warn!(line = line_no + 1, error = %e, "skipping malformed action line"),
            }
        }
        actions
    }

    /// `text` with every action line removed, for display.
    pub fn strip_action_lines(&self, text: &str) -> String {
        text.lines()
            .filter(|line| !self.is_action_line(line))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

/// Parse with the default marker.
pub fn parse_actions(text: &str) -> Vec<ActionInvocation> {
    ActionParser::new().parse(text)
}

/// Strip action lines using the default marker.
pub fn strip_action_lines(text: &str) -> String {
    ActionParser::new().strip_action_lines(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_valid_one_malformed() {
        let text = r#"Sure, doing that now.
ACTION: {"tool": "search_issues", "args": {"jql": "project = X"}}
ACTION: {"args": {"issue_key": "X-1"}}
ACTION: {"tool": "add_comment", "args": {"issue_key": "X-1", "body": "on it"}}
Done."#;
        let actions = parse_actions(text);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].tool, "search_issues");
        assert_eq!(actions[0].args["jql"], "project = X");
        assert_eq!(actions[1].tool, "add_comment");
    }

    #[test]
    fn test_invalid_json_is_skipped() {
        let text = "ACTION: {\"tool\": \"a\", \"args\": {\nACTION: {\"tool\": \"b\", \"args\": {}}";
        let actions = parse_actions(text);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].tool, "b");
    }

    #[test]
    fn test_parse_line_errors() {
        let parser = ActionParser::new();
        assert_eq!(parser.parse_line("no marker here"), Ok(None));
        assert_eq!(
            parser.parse_line("ACTION: [1, 2]"),
            Err(ActionParseError::NotAnObject)
        );
        assert_eq!(
            parser.parse_line(r#"ACTION: {"tool": 5}"#),
            Err(ActionParseError::MissingTool)
        );
        assert_eq!(
            parser.parse_line(r#"ACTION: {"tool": "x", "args": "nope"}"#),
            Err(ActionParseError::InvalidArgs)
        );
        assert!(matches!(
            parser.parse_line("ACTION:"),
            Err(ActionParseError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_args_object_is_required() {
        let parser = ActionParser::new();
        assert_eq!(
            parser.parse_line(r#"ACTION: {"tool": "get_components"}"#),
            Err(ActionParseError::MissingArgs)
        );
        assert_eq!(
            parser.parse_line(r#"ACTION: {"tool": "get_components", "args": null}"#),
            Err(ActionParseError::InvalidArgs)
        );
        let action = parser
            .parse_line(r#"  ACTION: {"tool": "get_components", "args": {}} trailing words"#)
            .unwrap()
            .unwrap();
        assert_eq!(action.tool, "get_components");
        assert!(action.args.is_empty());
    }

    #[test]
    fn test_marker_mid_line_is_not_an_action() {
        assert!(parse_actions(r#"I would write ACTION: {"tool": "x", "args": {}}"#).is_empty());
    }

    #[test]
    fn test_action_line_rendering_parses_back() {
        let action = ActionParser::new()
            .parse_line(r#"ACTION: {"tool": "log_work", "args": {"issue_key": "A-1", "seconds": 60}}"#)
            .unwrap()
            .unwrap();
        let line = action.to_action_line();
        assert!(line.starts_with("ACTION: {"));
        assert_eq!(parse_actions(&line), vec![action]);
    }

    #[test]
    fn test_strip_action_lines() {
        let text = "Moving it now.\nACTION: {\"tool\": \"x\"}\n\nAll set.";
        assert_eq!(strip_action_lines(text), "Moving it now.\n\nAll set.");
    }

    #[test]
    fn test_custom_marker() {
        let parser = ActionParser::with_marker("CALL>");
        let actions = parser.parse("CALL> {\"tool\": \"x\", \"args\": {}}\nACTION: {\"tool\": \"y\", \"args\": {}}");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].tool, "x");
    }
}
