//! Issue-tracker tools.
//!
//! One tool per `IssueService` operation, bundled in the `issue_tracker`
//! capability. Every tool holds a [`ServiceHandle`] and resolves it at call
//! time; a gone service yields a failure result, never a panic.
//!
//! The operation bodies are plain async functions over `&dyn IssueService`
//! so the typed-intent path in the executor produces the same messages as
//! the tool path.

pub mod comment;
pub mod components;
pub mod create;
pub mod delete;
pub mod history;
pub mod link;
pub mod people;
pub mod search;
pub mod update;
pub mod workflow;
pub mod worklog;

use std::sync::Arc;

use ticketeer_core::{Intent, IssueService, ServiceHandle};

use crate::capability::Capability;
use crate::tool::Tool;

pub use comment::AddCommentTool;
pub use components::GetComponentsTool;
pub use create::CreateIssueTool;
pub use delete::DeleteIssueTool;
pub use history::GetChangelogTool;
pub use link::LinkIssuesTool;
pub use people::{AddWatcherTool, AssignIssueTool};
pub use search::SearchIssuesTool;
pub use update::UpdateIssueTool;
pub use workflow::{GetTransitionsTool, TransitionIssueTool};
pub use worklog::LogWorkTool;

pub const CAPABILITY_NAME: &str = "issue_tracker";

/// Tool names, shared with permission rules and intent mapping.
pub mod names {
    pub const SEARCH_ISSUES: &str = "search_issues";
    pub const CREATE_ISSUE: &str = "create_issue";
    pub const UPDATE_ISSUE: &str = "update_issue";
    pub const LOG_WORK: &str = "log_work";
    pub const TRANSITION_ISSUE: &str = "transition_issue";
    pub const GET_TRANSITIONS: &str = "get_transitions";
    pub const ADD_COMMENT: &str = "add_comment";
    pub const ASSIGN_ISSUE: &str = "assign_issue";
    pub const DELETE_ISSUE: &str = "delete_issue";
    pub const ADD_WATCHER: &str = "add_watcher";
    pub const LINK_ISSUES: &str = "link_issues";
    pub const GET_CHANGELOG: &str = "get_changelog";
    pub const GET_COMPONENTS: &str = "get_components";
}

/// The tool an intent is equivalent to, for permission checks.
pub fn tool_name_for(intent: &Intent) -> &'static str {
    match intent {
        Intent::Search { .. } | Intent::ShowDetail { .. } => names::SEARCH_ISSUES,
        Intent::Create { .. } => names::CREATE_ISSUE,
        Intent::Update { .. } => names::UPDATE_ISSUE,
        Intent::LogWork { .. } => names::LOG_WORK,
        Intent::ChangeStatus { .. } => names::TRANSITION_ISSUE,
        Intent::Comment { .. } => names::ADD_COMMENT,
        Intent::Delete { .. } => names::DELETE_ISSUE,
        Intent::Assign { .. } => names::ASSIGN_ISSUE,
        Intent::AddWatcher { .. } => names::ADD_WATCHER,
        Intent::Link { .. } => names::LINK_ISSUES,
        Intent::FetchChangelog { .. } => names::GET_CHANGELOG,
    }
}

/// Capability exposing the issue-tracker tools.
///
/// Lists no tools while the backing service is unavailable, so the schema
/// and prompt text never advertise calls that cannot succeed.
pub struct IssueTrackerCapability {
    handle: ServiceHandle,
    default_project: Option<String>,
}

impl IssueTrackerCapability {
    pub fn new(handle: ServiceHandle) -> Self {
        Self {
            handle,
            default_project: None,
        }
    }

    pub fn for_service(service: &Arc<dyn IssueService>) -> Self {
        Self::new(ServiceHandle::new(service))
    }

    /// Project used by `create_issue` when the call names none.
    pub fn with_default_project(mut self, project: Option<String>) -> Self {
        self.default_project = project.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn handle(&self) -> &ServiceHandle {
        &self.handle
    }
}

impl Capability for IssueTrackerCapability {
    fn name(&self) -> &str {
        CAPABILITY_NAME
    }

    fn description(&self) -> &str {
        "Search, create and modify issues in the connected issue tracker."
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        if !self.handle.is_available() {
            return Vec::new();
        }
        let h = &self.handle;
        vec![
            Arc::new(SearchIssuesTool::new(h.clone())),
            Arc::new(CreateIssueTool::new(h.clone()).with_default_project(self.default_project.clone())),
            Arc::new(UpdateIssueTool::new(h.clone())),
            Arc::new(LogWorkTool::new(h.clone())),
            Arc::new(TransitionIssueTool::new(h.clone())),
            Arc::new(GetTransitionsTool::new(h.clone())),
            Arc::new(AddCommentTool::new(h.clone())),
            Arc::new(AssignIssueTool::new(h.clone())),
            Arc::new(DeleteIssueTool::new(h.clone())),
            Arc::new(AddWatcherTool::new(h.clone())),
            Arc::new(LinkIssuesTool::new(h.clone())),
            Arc::new(GetChangelogTool::new(h.clone())),
            Arc::new(GetComponentsTool::new(h.clone())),
        ]
    }
}
