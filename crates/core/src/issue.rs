use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of a search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub key: String,
    pub summary: String,
    pub status: String,
    #[serde(default)]
    pub issue_type: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

impl std::fmt::Display for IssueSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.key, self.status, self.summary)?;
        if let Some(assignee) = &self.assignee {
            write!(f, " (@{})", assignee)?;
        }
        Ok(())
    }
}

/// Fields for a new issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIssue {
    pub project: String,
    pub summary: String,
    #[serde(default = "default_issue_type")]
    pub issue_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

pub fn default_issue_type() -> String {
    "Task".to_string()
}

impl NewIssue {
    pub fn new(project: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            summary: summary.into(),
            issue_type: default_issue_type(),
            description: None,
            assignee: None,
            priority: None,
            labels: Vec::new(),
        }
    }
}

/// Free-form field updates, keyed by field name.
pub type FieldUpdates = Map<String, Value>;

/// A workflow transition available from an issue's current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub name: String,
    pub target_status: String,
}

impl Transition {
    /// Whether `wanted` names this transition or its target status.
    pub fn matches(&self, wanted: &str) -> bool {
        self.name.eq_ignore_ascii_case(wanted) || self.target_status.eq_ignore_ascii_case(wanted)
    }
}

/// A single field change in an issue's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub author: String,
    pub created: DateTime<Utc>,
    pub field: String,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl std::fmt::Display for ChangelogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} changed {}: {} -> {}",
            self.created.format("%Y-%m-%d %H:%M"),
            self.author,
            self.field,
            self.from.as_deref().unwrap_or("(none)"),
            self.to.as_deref().unwrap_or("(none)")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub lead: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_matches_name_or_target() {
        let t = Transition {
            name: "Start Progress".to_string(),
            target_status: "In Progress".to_string(),
        };
        assert!(t.matches("start progress"));
        assert!(t.matches("IN PROGRESS"));
        assert!(!t.matches("Done"));
    }

    #[test]
    fn test_new_issue_defaults() {
        let issue: NewIssue =
            serde_json::from_value(serde_json::json!({"project": "X", "summary": "s"})).unwrap();
        assert_eq!(issue.issue_type, "Task");
        assert!(issue.labels.is_empty());
    }

    #[test]
    fn test_summary_display() {
        let s = IssueSummary {
            key: "X-1".to_string(),
            summary: "Broken build".to_string(),
            status: "Open".to_string(),
            issue_type: "Bug".to_string(),
            assignee: Some("ana".to_string()),
            priority: None,
        };
        assert_eq!(s.to_string(), "X-1 [Open] Broken build (@ana)");
    }
}
