//! The issue-tracker collaborator contract.
//!
//! Every tracker operation the agent can trigger goes through [`IssueService`].
//! Implementations own transport, authentication and timeouts; callers only
//! see the typed results below.
//!
//! Fidelity gap: HTTP-backed implementations typically report mutation success
//! from the response status class alone (any 2xx), not from a confirmed state
//! change. A `Ok(())` from `update`, `assign`, `add_watcher` or `link` therefore
//! means "the tracker accepted the request", nothing stronger.

use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::error::ServiceResult;
use crate::issue::{ChangelogEntry, Component, FieldUpdates, IssueSummary, NewIssue, Transition};

#[async_trait]
pub trait IssueService: Send + Sync {
    /// Run a tracker query (JQL or equivalent).
    async fn search(&self, query: &str) -> ServiceResult<Vec<IssueSummary>>;

    /// Create an issue. The key is `None` when the tracker accepted the
    /// request but did not echo one back.
    async fn create(&self, issue: &NewIssue) -> ServiceResult<Option<String>>;

    async fn update(&self, issue_key: &str, fields: &FieldUpdates) -> ServiceResult<()>;

    async fn log_work(&self, issue_key: &str, seconds: u64, comment: Option<&str>) -> ServiceResult<()>;

    /// Move the issue to `status_name`.
    async fn transition(&self, issue_key: &str, status_name: &str) -> ServiceResult<()>;

    async fn comment(&self, issue_key: &str, body: &str) -> ServiceResult<()>;

    async fn assign(&self, issue_key: &str, assignee: &str) -> ServiceResult<()>;

    async fn delete(&self, issue_key: &str) -> ServiceResult<()>;

    async fn add_watcher(&self, issue_key: &str, watcher: &str) -> ServiceResult<()>;

    async fn link(&self, issue_key: &str, other_key: &str, link_type: &str) -> ServiceResult<()>;

    async fn fetch_transitions(&self, issue_key: &str) -> ServiceResult<Vec<Transition>>;

    async fn fetch_changelog(&self, issue_key: &str) -> ServiceResult<Vec<ChangelogEntry>>;

    async fn fetch_components(&self, project_key: &str) -> ServiceResult<Vec<Component>>;
}

/// Non-owning reference to an `IssueService`.
///
/// Tools and capabilities hold one of these instead of an `Arc` so that
/// dropping or replacing the service (reconfiguration) is never blocked by
/// the registry. [`ServiceHandle::get`] returns `None` once the service is gone.
#[derive(Clone)]
pub struct ServiceHandle {
    inner: Option<Weak<dyn IssueService>>,
}

impl ServiceHandle {
    pub fn new(service: &Arc<dyn IssueService>) -> Self {
        Self {
            inner: Some(Arc::downgrade(service)),
        }
    }

    /// A handle that never resolves.
    pub fn detached() -> Self {
        Self { inner: None }
    }

    pub fn get(&self) -> Option<Arc<dyn IssueService>> {
        self.inner.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_available(&self) -> bool {
        self.get().is_some()
    }

    /// True when both handles point at the same live service instance.
    pub fn same_service(&self, other: &ServiceHandle) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Weak::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("available", &self.is_available())
            .finish()
    }
}
