//! End-to-end: model text → parser → registry → issue service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use ticketeer_core::{
    ChangelogEntry, Component, FieldUpdates, InMemoryIssueService, Intent, IssueService,
    IssueServiceError, IssueSummary, NewIssue, ServiceHandle, ServiceResult, Transition,
};
use ticketeer_tool_runtime::{
    parse_actions, CapabilityRegistry, Conversation, ExecutionStatus, IntentExecutor,
    IssueTrackerCapability, RunContext, ScriptedModelClient, ToolError, TurnRunner,
};

/// Returns three issues for any search and counts every call.
#[derive(Default)]
struct StubService {
    calls: AtomicUsize,
}

impl StubService {
    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn unsupported<T>(&self) -> ServiceResult<T> {
        self.touch();
        Err(IssueServiceError::Rejected("not supported by stub".to_string()))
    }
}

#[async_trait]
impl IssueService for StubService {
    async fn search(&self, _query: &str) -> ServiceResult<Vec<IssueSummary>> {
        self.touch();
        Ok((1..=3)
            .map(|n| IssueSummary {
                key: format!("X-{n}"),
                summary: format!("Issue {n}"),
                status: "To Do".to_string(),
                issue_type: "Task".to_string(),
                assignee: None,
                priority: None,
            })
            .collect())
    }
    async fn create(&self, _issue: &NewIssue) -> ServiceResult<Option<String>> {
        self.unsupported()
    }
    async fn update(&self, _key: &str, _fields: &FieldUpdates) -> ServiceResult<()> {
        self.unsupported()
    }
    async fn log_work(&self, _key: &str, _seconds: u64, _comment: Option<&str>) -> ServiceResult<()> {
        self.unsupported()
    }
    async fn transition(&self, _key: &str, _status: &str) -> ServiceResult<()> {
        self.unsupported()
    }
    async fn comment(&self, _key: &str, _body: &str) -> ServiceResult<()> {
        self.unsupported()
    }
    async fn assign(&self, _key: &str, _assignee: &str) -> ServiceResult<()> {
        self.unsupported()
    }
    async fn delete(&self, _key: &str) -> ServiceResult<()> {
        self.unsupported()
    }
    async fn add_watcher(&self, _key: &str, _watcher: &str) -> ServiceResult<()> {
        self.unsupported()
    }
    async fn link(&self, _key: &str, _other: &str, _link_type: &str) -> ServiceResult<()> {
        self.unsupported()
    }
    async fn fetch_transitions(&self, _key: &str) -> ServiceResult<Vec<Transition>> {
        self.unsupported()
    }
    async fn fetch_changelog(&self, _key: &str) -> ServiceResult<Vec<ChangelogEntry>> {
        self.unsupported()
    }
    async fn fetch_components(&self, _project: &str) -> ServiceResult<Vec<Component>> {
        self.unsupported()
    }
}

const SEED: &str = r#"{
    "projects": [{"key": "OPS", "components": [{"name": "api"}]}],
    "issues": [
        {"key": "OPS-1", "summary": "Broken build", "status": "To Do", "issue_type": "Bug"},
        {"key": "OPS-2", "summary": "Rotate keys", "status": "In Progress"}
    ]
}"#;

fn seeded() -> (Arc<InMemoryIssueService>, Arc<dyn IssueService>) {
    let tracker = Arc::new(InMemoryIssueService::from_json(SEED).unwrap());
    let service: Arc<dyn IssueService> = tracker.clone();
    (tracker, service)
}

#[tokio::test]
async fn search_action_reports_issue_count() {
    let stub = Arc::new(StubService::default());
    let service: Arc<dyn IssueService> = stub.clone();
    let registry = CapabilityRegistry::new();
    registry.register(IssueTrackerCapability::for_service(&service));

    let actions =
        parse_actions(r#"ACTION: {"tool": "search_issues", "args": {"jql": "project = X"}}"#);
    assert_eq!(actions.len(), 1);

    let result = registry
        .execute(&actions[0].tool, &actions[0].args)
        .await
        .unwrap();
    assert!(result.success);
    assert!(result.message.unwrap().contains('3'));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_tool_touches_nothing() {
    let stub = Arc::new(StubService::default());
    let service: Arc<dyn IssueService> = stub.clone();
    let registry = CapabilityRegistry::new();
    registry.register(IssueTrackerCapability::for_service(&service));

    let err = registry
        .execute("nonexistent_tool", &serde_json::Map::new())
        .await
        .unwrap_err();
    assert_eq!(err, ToolError::ToolNotFound("nonexistent_tool".to_string()));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failing_middle_intent_does_not_stop_batch() {
    let (tracker, service) = seeded();
    tracker.fail_on("comment");
    let executor = IntentExecutor::new(
        Arc::new(CapabilityRegistry::new()),
        ServiceHandle::new(&service),
    );

    let intents: Vec<Intent> = serde_json::from_value(json!([
        {"type": "change_status", "issue_key": "OPS-1", "status": "In Progress"},
        {"type": "comment", "issue_key": "OPS-1", "body": "Picked up"},
        {"type": "assign", "issue_key": "OPS-1", "assignee": "ana"}
    ]))
    .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let report = executor
        .execute_intents(&intents, &RunContext::new().with_events(tx))
        .await;

    let order: Vec<(usize, ExecutionStatus)> =
        report.events.iter().map(|e| (e.index, e.status)).collect();
    assert_eq!(
        order,
        vec![
            (0, ExecutionStatus::Started),
            (0, ExecutionStatus::Succeeded),
            (1, ExecutionStatus::Started),
            (1, ExecutionStatus::Failed),
            (2, ExecutionStatus::Started),
            (2, ExecutionStatus::Succeeded),
        ]
    );
    assert_eq!(
        report.events[3].message,
        "Execution failed: API error: 500 - comment failed"
    );
    assert_eq!(tracker.assignee_of("OPS-1").as_deref(), Some("ana"));
    assert_eq!(
        tracker.calls(),
        vec!["fetch_transitions", "transition", "comment", "assign"]
    );

    let mut streamed = 0;
    while rx.try_recv().is_ok() {
        streamed += 1;
    }
    assert_eq!(streamed, 6);
}

#[tokio::test]
async fn replayed_reply_runs_actions_in_order() {
    let (tracker, service) = seeded();
    let registry = Arc::new(CapabilityRegistry::new());
    registry.register(IssueTrackerCapability::for_service(&service));
    let executor = Arc::new(IntentExecutor::new(registry, ServiceHandle::new(&service)));

    let reply = r#"I'll move OPS-2 to review and leave a note.
ACTION: {"tool": "transition_issue", "args": {"issue_key": "OPS-2", "status": "In Review"}}
ACTION: {"tool": "add_comment", "args": {"issue_key": "OPS-2", "body": "Ready for review"}}
ACTION: {"tool": "log_work", "args": {"issue_key": "OPS-2", "time_spent": "2h"}}
ACTION: this line is broken
Done."#;
    let runner = TurnRunner::new(Arc::new(ScriptedModelClient::new(reply, 16)), executor);

    let mut conversation = Conversation::default();
    let outcome = runner
        .run(&mut conversation, "send OPS-2 to review".to_string(), &RunContext::new())
        .await
        .unwrap();

    assert_eq!(
        outcome.display_text,
        "I'll move OPS-2 to review and leave a note.\nDone."
    );
    assert_eq!(outcome.actions.len(), 3);
    assert!(outcome.report.all_succeeded());
    assert_eq!(tracker.status_of("OPS-2").as_deref(), Some("In Review"));
    assert_eq!(tracker.comments_of("OPS-2"), vec!["Ready for review".to_string()]);
    assert_eq!(tracker.logged_seconds("OPS-2"), 2 * 3600);
}

#[tokio::test]
async fn replacing_service_rebinds_tools() {
    let (first, first_service) = seeded();
    let (second, second_service) = seeded();
    let registry = CapabilityRegistry::new();
    registry.register(IssueTrackerCapability::for_service(&first_service));
    registry.register(IssueTrackerCapability::for_service(&second_service));
    assert_eq!(registry.capability_names().len(), 1);

    drop(first_service);
    drop(first);

    let mut args = serde_json::Map::new();
    args.insert("issue_key".to_string(), json!("OPS-1"));
    args.insert("body".to_string(), json!("hello"));
    let result = registry.execute("add_comment", &args).await.unwrap();
    assert!(result.success);
    assert_eq!(second.comments_of("OPS-1"), vec!["hello".to_string()]);
}

#[tokio::test]
async fn schema_is_empty_once_service_is_gone() {
    let (tracker, service) = seeded();
    let registry = CapabilityRegistry::new();
    registry.register(IssueTrackerCapability::for_service(&service));
    assert_eq!(registry.generate_schema().len(), 13);

    drop(service);
    drop(tracker);
    // Tool lists are captured at registration; re-registering picks up the loss.
    registry.register(IssueTrackerCapability::new(ServiceHandle::detached()));
    assert!(registry.generate_schema().is_empty());
}
