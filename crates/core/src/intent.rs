use serde::{Deserialize, Serialize};

use crate::duration::format_work_duration;
use crate::issue::{FieldUpdates, NewIssue};

/// A typed tracker operation produced by interpreting a model reply.
///
/// Serialized with an internal `type` tag, e.g.
/// `{"type": "change_status", "issue_key": "X-1", "status": "Done"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    Search {
        jql: String,
    },
    Create {
        #[serde(flatten)]
        issue: NewIssue,
    },
    Update {
        issue_key: String,
        fields: FieldUpdates,
    },
    LogWork {
        issue_key: String,
        seconds: u64,
        #[serde(default)]
        comment: Option<String>,
    },
    ChangeStatus {
        issue_key: String,
        status: String,
    },
    Comment {
        issue_key: String,
        body: String,
    },
    Delete {
        issue_key: String,
    },
    Assign {
        issue_key: String,
        assignee: String,
    },
    AddWatcher {
        issue_key: String,
        watcher: String,
    },
    Link {
        issue_key: String,
        other_key: String,
        #[serde(default = "default_link_type")]
        link_type: String,
    },
    FetchChangelog {
        issue_key: String,
    },
    ShowDetail {
        issue_key: String,
    },
}

pub fn default_link_type() -> String {
    "Relates".to_string()
}

impl Intent {
    /// Short operation name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::Search { .. } => "search",
            Intent::Create { .. } => "create",
            Intent::Update { .. } => "update",
            Intent::LogWork { .. } => "log_work",
            Intent::ChangeStatus { .. } => "change_status",
            Intent::Comment { .. } => "comment",
            Intent::Delete { .. } => "delete",
            Intent::Assign { .. } => "assign",
            Intent::AddWatcher { .. } => "add_watcher",
            Intent::Link { .. } => "link",
            Intent::FetchChangelog { .. } => "fetch_changelog",
            Intent::ShowDetail { .. } => "show_detail",
        }
    }

    /// User-readable description of what is about to happen.
    pub fn describe(&self) -> String {
        match self {
            Intent::Search { jql } => format!("Searching issues: {jql}"),
            Intent::Create { issue } => {
                format!("Creating {} in {}: {}", issue.issue_type, issue.project, issue.summary)
            }
            Intent::Update { issue_key, fields } => {
                let names: Vec<&str> = fields.keys().map(String::as_str).collect();
                format!("Updating {issue_key} ({})", names.join(", "))
            }
            Intent::LogWork { issue_key, seconds, .. } => {
                format!("Logging {} on {issue_key}", format_work_duration(*seconds))
            }
            Intent::ChangeStatus { issue_key, status } => {
                format!("Moving {issue_key} to {status}")
            }
            Intent::Comment { issue_key, .. } => format!("Commenting on {issue_key}"),
            Intent::Delete { issue_key } => format!("Deleting {issue_key}"),
            Intent::Assign { issue_key, assignee } => {
                format!("Assigning {issue_key} to {assignee}")
            }
            Intent::AddWatcher { issue_key, watcher } => {
                format!("Adding {watcher} as watcher on {issue_key}")
            }
            Intent::Link { issue_key, other_key, link_type } => {
                format!("Linking {issue_key} to {other_key} ({link_type})")
            }
            Intent::FetchChangelog { issue_key } => format!("Fetching history of {issue_key}"),
            Intent::ShowDetail { issue_key } => format!("Loading {issue_key}"),
        }
    }
}
