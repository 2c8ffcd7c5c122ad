//! Deterministic in-process `IssueService`.
//!
//! Backs the CLI replay commands and the test suites. Supports a small query
//! subset (`field = value` clauses joined by `AND`, optional `ORDER BY`), a
//! fixed four-state workflow, and per-operation failure injection.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IssueServiceError, ServiceResult};
use crate::issue::{ChangelogEntry, Component, FieldUpdates, IssueSummary, NewIssue, Transition};
use crate::service::IssueService;

const AUTHOR: &str = "ticketeer";

/// Seed document for [`InMemoryIssueService::from_seed`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub projects: Vec<SeedProject>,
    #[serde(default)]
    pub issues: Vec<IssueSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedProject {
    pub key: String,
    #[serde(default)]
    pub components: Vec<Component>,
}

#[derive(Debug, Clone)]
struct StoredIssue {
    summary: IssueSummary,
    description: Option<String>,
    labels: Vec<String>,
    extra: FieldUpdates,
    comments: Vec<String>,
    worklog_seconds: u64,
    watchers: Vec<String>,
    links: Vec<(String, String)>,
    changelog: Vec<ChangelogEntry>,
}

impl StoredIssue {
    fn new(summary: IssueSummary) -> Self {
        Self {
            summary,
            description: None,
            labels: Vec::new(),
            extra: FieldUpdates::new(),
            comments: Vec::new(),
            worklog_seconds: 0,
            watchers: Vec::new(),
            links: Vec::new(),
            changelog: Vec::new(),
        }
    }

    fn record(&mut self, field: &str, from: Option<String>, to: Option<String>) {
        self.changelog.push(ChangelogEntry {
            author: AUTHOR.to_string(),
            created: Utc::now(),
            field: field.to_string(),
            from,
            to,
        });
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    issues: BTreeMap<String, StoredIssue>,
    components: BTreeMap<String, Vec<Component>>,
    failing: HashSet<String>,
    calls: Vec<String>,
}

impl TrackerState {
    fn issue_mut(&mut self, key: &str) -> ServiceResult<&mut StoredIssue> {
        self.issues
            .get_mut(&key.to_uppercase())
            .ok_or_else(|| IssueServiceError::NotFound(key.to_string()))
    }

    fn issue(&self, key: &str) -> ServiceResult<&StoredIssue> {
        self.issues
            .get(&key.to_uppercase())
            .ok_or_else(|| IssueServiceError::NotFound(key.to_string()))
    }

    fn next_key(&self, project: &str) -> ServiceResult<String> {
        let prefix = format!("{}-", project.to_uppercase());
        let highest = self
            .issues
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|n| n.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        let next = highest.checked_add(1).ok_or_else(|| {
            IssueServiceError::Rejected(format!("no issue numbers left in project {}", project))
        })?;
        Ok(format!("{}{}", prefix, next))
    }
}

/// A validated field update, applied only once every field has been checked.
enum FieldChange {
    Summary(String),
    Description(Option<String>),
    Priority(Option<String>),
    Labels(Vec<String>),
    Extra(String, serde_json::Value),
}

/// Workflow transitions available from `status`.
fn workflow(status: &str) -> Vec<Transition> {
    let t = |name: &str, target: &str| Transition {
        name: name.to_string(),
        target_status: target.to_string(),
    };
    match status.to_ascii_lowercase().as_str() {
        "to do" | "open" => vec![t("Start Progress", "In Progress"), t("Done", "Done")],
        "in progress" => vec![
            t("Stop Progress", "To Do"),
            t("Request Review", "In Review"),
            t("Done", "Done"),
        ],
        "in review" => vec![t("Back to Progress", "In Progress"), t("Done", "Done")],
        "done" | "closed" => vec![t("Reopen", "To Do")],
        _ => vec![t("Done", "Done")],
    }
}

#[derive(Debug, PartialEq)]
enum Clause {
    Project(String),
    Key(String),
    Status(String),
    Assignee(String),
    Type(String),
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches(|c| c == '"' || c == '\'').to_string()
}

fn parse_query(query: &str) -> ServiceResult<Vec<Clause>> {
    let upper = query.to_ascii_uppercase();
    let body = match upper.find("ORDER BY") {
        Some(idx) => &query[..idx],
        None => query,
    };
    let mut clauses = Vec::new();
    for raw in split_and(body) {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let (field, value) = raw
            .split_once('=')
            .ok_or_else(|| IssueServiceError::Rejected(format!("unsupported clause '{raw}'")))?;
        let value = unquote(value);
        let clause = match field.trim().to_ascii_lowercase().as_str() {
            "project" => Clause::Project(value),
            "key" | "issuekey" => Clause::Key(value),
            "status" => Clause::Status(value),
            "assignee" => Clause::Assignee(value),
            "type" | "issuetype" => Clause::Type(value),
            other => {
                return Err(IssueServiceError::Rejected(format!(
                    "unsupported field '{other}'"
                )))
            }
        };
        clauses.push(clause);
    }
    Ok(clauses)
}

/// Split on the `AND` keyword, case-insensitively.
fn split_and(query: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = Vec::new();
    for word in query.split_whitespace() {
        if word.eq_ignore_ascii_case("and") {
            parts.push(current.join(" "));
            current.clear();
        } else {
            current.push(word);
        }
    }
    parts.push(current.join(" "));
    parts
}

fn clause_matches(clause: &Clause, issue: &IssueSummary) -> bool {
    match clause {
        Clause::Project(p) => issue
            .key
            .split_once('-')
            .is_some_and(|(project, _)| project.eq_ignore_ascii_case(p)),
        Clause::Key(k) => issue.key.eq_ignore_ascii_case(k),
        Clause::Status(s) => issue.status.eq_ignore_ascii_case(s),
        Clause::Assignee(a) => issue
            .assignee
            .as_deref()
            .is_some_and(|current| current.eq_ignore_ascii_case(a)),
        Clause::Type(t) => issue.issue_type.eq_ignore_ascii_case(t),
    }
}

/// In-memory issue tracker.
#[derive(Debug, Default)]
pub struct InMemoryIssueService {
    state: Mutex<TrackerState>,
}

impl InMemoryIssueService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: Seed) -> Self {
        let service = Self::new();
        {
            let mut state = service.lock();
            for project in seed.projects {
                state
                    .components
                    .insert(project.key.to_uppercase(), project.components);
            }
            for issue in seed.issues {
                state
                    .issues
                    .insert(issue.key.to_uppercase(), StoredIssue::new(issue));
            }
        }
        service
    }

    /// Parse a JSON [`Seed`] document.
    pub fn from_json(json: &str) -> ServiceResult<Self> {
        let seed: Seed =
            serde_json::from_str(json).map_err(|e| IssueServiceError::Seed(e.to_string()))?;
        Ok(Self::from_seed(seed))
    }

    /// Make every call to `operation` (e.g. `"comment"`) fail with a 500.
    pub fn fail_on(&self, operation: &str) {
        self.lock().failing.insert(operation.to_string());
    }

    /// Operation names in the order they were invoked.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn issue_count(&self) -> usize {
        self.lock().issues.len()
    }

    pub fn status_of(&self, key: &str) -> Option<String> {
        self.lock().issue(key).ok().map(|i| i.summary.status.clone())
    }

    pub fn assignee_of(&self, key: &str) -> Option<String> {
        self.lock().issue(key).ok().and_then(|i| i.summary.assignee.clone())
    }

    pub fn comments_of(&self, key: &str) -> Vec<String> {
        self.lock()
            .issue(key)
            .map(|i| i.comments.clone())
            .unwrap_or_default()
    }

    pub fn logged_seconds(&self, key: &str) -> u64 {
        self.lock().issue(key).map(|i| i.worklog_seconds).unwrap_or(0)
    }

    pub fn watchers_of(&self, key: &str) -> Vec<String> {
        self.lock()
            .issue(key)
            .map(|i| i.watchers.clone())
            .unwrap_or_default()
    }

    pub fn links_of(&self, key: &str) -> Vec<(String, String)> {
        self.lock()
            .issue(key)
            .map(|i| i.links.clone())
            .unwrap_or_default()
    }

    pub fn field_of(&self, key: &str, field: &str) -> Option<serde_json::Value> {
        let state = self.lock();
        let issue = state.issue(key).ok()?;
        match field {
            "summary" => Some(issue.summary.summary.clone().into()),
            "description" => issue.description.clone().map(Into::into),
            "priority" => issue.summary.priority.clone().map(Into::into),
            "labels" => Some(issue.labels.clone().into()),
            _ => issue.extra.get(field).cloned(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and apply failure injection.
    fn begin(&self, operation: &str) -> ServiceResult<MutexGuard<'_, TrackerState>> {
        let mut state = self.lock();
        state.calls.push(operation.to_string());
        if state.failing.contains(operation) {
            debug!(operation, "injected failure");
            return Err(IssueServiceError::Api {
                status: 500,
                message: format!("{operation} failed"),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl IssueService for InMemoryIssueService {
    async fn search(&self, query: &str) -> ServiceResult<Vec<IssueSummary>> {
        let state = self.begin("search")?;
        let clauses = parse_query(query)?;
        Ok(state
            .issues
            .values()
            .map(|i| &i.summary)
            .filter(|s| clauses.iter().all(|c| clause_matches(c, s)))
            .cloned()
            .collect())
    }

    async fn create(&self, issue: &NewIssue) -> ServiceResult<Option<String>> {
        let mut state = self.begin("create")?;
        if issue.summary.trim().is_empty() {
            return Err(IssueServiceError::Rejected("summary must not be empty".to_string()));
        }
        let key = state.next_key(&issue.project)?;
        let mut stored = StoredIssue::new(IssueSummary {
            key: key.clone(),
            summary: issue.summary.clone(),
            status: "To Do".to_string(),
            issue_type: issue.issue_type.clone(),
            assignee: issue.assignee.clone(),
            priority: issue.priority.clone(),
        });
        stored.description = issue.description.clone();
        stored.labels = issue.labels.clone();
        state.issues.insert(key.clone(), stored);
        Ok(Some(key))
    }

    async fn update(&self, issue_key: &str, fields: &FieldUpdates) -> ServiceResult<()> {
        let mut state = self.begin("update")?;
        let issue = state.issue_mut(issue_key)?;

        // Check every field before touching the issue so a rejection leaves it unchanged.
        let mut changes = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            let change = match name.as_str() {
                "summary" => FieldChange::Summary(value.as_str().map(String::from).ok_or_else(
                    || IssueServiceError::Rejected("summary must be a string".to_string()),
                )?),
                "description" => FieldChange::Description(value.as_str().map(String::from)),
                "priority" => FieldChange::Priority(value.as_str().map(String::from)),
                "labels" => FieldChange::Labels(serde_json::from_value(value.clone()).map_err(
                    |_| IssueServiceError::Rejected("labels must be a list of strings".to_string()),
                )?),
                other => FieldChange::Extra(other.to_string(), value.clone()),
            };
            changes.push(change);
        }

        for change in changes {
            match change {
                FieldChange::Summary(to) => {
                    let from = std::mem::replace(&mut issue.summary.summary, to.clone());
                    issue.record("summary", Some(from), Some(to));
                }
                FieldChange::Description(to) => {
                    let from = std::mem::replace(&mut issue.description, to.clone());
                    issue.record("description", from, to);
                }
                FieldChange::Priority(to) => {
                    let from = std::mem::replace(&mut issue.summary.priority, to.clone());
                    issue.record("priority", from, to);
                }
                FieldChange::Labels(labels) => {
                    let from = issue.labels.join(",");
                    issue.labels = labels;
                    let to = issue.labels.join(",");
                    issue.record("labels", Some(from), Some(to));
                }
                FieldChange::Extra(name, value) => {
                    let from = issue.extra.insert(name.clone(), value.clone());
                    issue.record(&name, from.map(|v| v.to_string()), Some(value.to_string()));
                }
            }
        }
        Ok(())
    }

    async fn log_work(&self, issue_key: &str, seconds: u64, comment: Option<&str>) -> ServiceResult<()> {
        let mut state = self.begin("log_work")?;
        if seconds == 0 {
            return Err(IssueServiceError::Rejected("time spent must be positive".to_string()));
        }
        let issue = state.issue_mut(issue_key)?;
        issue.worklog_seconds += seconds;
        if let Some(text) = comment {
            issue.comments.push(text.to_string());
        }
        Ok(())
    }

    async fn transition(&self, issue_key: &str, status_name: &str) -> ServiceResult<()> {
        let mut state = self.begin("transition")?;
        let issue = state.issue_mut(issue_key)?;
        let target = workflow(&issue.summary.status)
            .into_iter()
            .find(|t| t.matches(status_name))
            .ok_or_else(|| {
                IssueServiceError::Rejected(format!(
                    "no transition to '{}' from '{}'",
                    status_name, issue.summary.status
                ))
            })?;
        let from = std::mem::replace(&mut issue.summary.status, target.target_status.clone());
        issue.record("status", Some(from), Some(target.target_status));
        Ok(())
    }

    async fn comment(&self, issue_key: &str, body: &str) -> ServiceResult<()> {
        let mut state = self.begin("comment")?;
        state.issue_mut(issue_key)?.comments.push(body.to_string());
        Ok(())
    }

    async fn assign(&self, issue_key: &str, assignee: &str) -> ServiceResult<()> {
        let mut state = self.begin("assign")?;
        let issue = state.issue_mut(issue_key)?;
        let to = if assignee.is_empty() || assignee.eq_ignore_ascii_case("unassigned") {
            None
        } else {
            Some(assignee.to_string())
        };
        let from = std::mem::replace(&mut issue.summary.assignee, to.clone());
        issue.record("assignee", from, to);
        Ok(())
    }

    async fn delete(&self, issue_key: &str) -> ServiceResult<()> {
        let mut state = self.begin("delete")?;
        state
            .issues
            .remove(&issue_key.to_uppercase())
            .map(|_| ())
            .ok_or_else(|| IssueServiceError::NotFound(issue_key.to_string()))
    }

    async fn add_watcher(&self, issue_key: &str, watcher: &str) -> ServiceResult<()> {
        let mut state = self.begin("add_watcher")?;
        let issue = state.issue_mut(issue_key)?;
        if !issue.watchers.iter().any(|w| w == watcher) {
            issue.watchers.push(watcher.to_string());
        }
        Ok(())
    }

    async fn link(&self, issue_key: &str, other_key: &str, link_type: &str) -> ServiceResult<()> {
        let mut state = self.begin("link")?;
        state.issue(other_key)?;
        state
            .issue_mut(issue_key)?
            .links
            .push((link_type.to_string(), other_key.to_uppercase()));
        Ok(())
    }

    async fn fetch_transitions(&self, issue_key: &str) -> ServiceResult<Vec<Transition>> {
        let state = self.begin("fetch_transitions")?;
        Ok(workflow(&state.issue(issue_key)?.summary.status))
    }

    async fn fetch_changelog(&self, issue_key: &str) -> ServiceResult<Vec<ChangelogEntry>> {
        let state = self.begin("fetch_changelog")?;
        Ok(state.issue(issue_key)?.changelog.clone())
    }

    async fn fetch_components(&self, project_key: &str) -> ServiceResult<Vec<Component>> {
        let state = self.begin("fetch_components")?;
        state
            .components
            .get(&project_key.to_uppercase())
            .cloned()
            .ok_or_else(|| IssueServiceError::NotFound(format!("project {project_key}")))
    }
}
