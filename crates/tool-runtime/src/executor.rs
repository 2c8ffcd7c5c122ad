//! Sequential, fault-isolated execution of parsed actions and typed intents.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use ticketeer_core::{Intent, IssueService, ServiceHandle};

use crate::conversation::ActionOutcome;
use crate::parser::ActionInvocation;
use crate::permission::{PermissionChecker, PermissionDecision, PermissionPolicy, PolicyChecker};
use crate::registry::CapabilityRegistry;
use crate::tool::{ToolArguments, ToolError, ToolResult};
use crate::tools;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Started,
    Succeeded,
    Failed,
    /// Never started because the run was cancelled
    Skipped,
}

/// One user-visible status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    /// Position of the item in the input sequence
    pub index: usize,
    /// Tool name, or intent kind for typed intents
    pub label: String,
    pub status: ExecutionStatus,
    pub message: String,
}

impl ExecutionEvent {
    pub fn is_terminal(&self) -> bool {
        self.status != ExecutionStatus::Started
    }
}

/// Everything that happened during one run, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub events: Vec<ExecutionEvent>,
    pub results: Vec<(usize, ToolResult)>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ExecutionReport {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    /// Terminal outcome of each attempted or skipped item, for history.
    pub fn outcomes(&self) -> Vec<ActionOutcome> {
        self.events
            .iter()
            .filter(|e| e.is_terminal())
            .map(|e| ActionOutcome {
                label: e.label.clone(),
                success: e.status == ExecutionStatus::Succeeded,
                message: e.message.clone(),
            })
            .collect()
    }

    fn push(&mut self, ctx: &RunContext, event: ExecutionEvent) {
        match event.status {
            ExecutionStatus::Started => {}
            ExecutionStatus::Succeeded => self.succeeded += 1,
            ExecutionStatus::Failed => self.failed += 1,
            ExecutionStatus::Skipped => self.skipped += 1,
        }
        if let Some(tx) = &ctx.events {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event.clone());
        }
        self.events.push(event);
    }
}

/// Cooperative cancellation shared between a turn and whoever may cancel it.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Per-run cancellation flag and optional live event channel.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub cancel: CancelFlag,
    pub events: Option<mpsc::UnboundedSender<ExecutionEvent>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
        self.events = Some(events);
        self
    }
}

enum WorkItem<'a> {
    Action(&'a ActionInvocation),
    Intent(&'a Intent),
}

impl WorkItem<'_> {
    fn label(&self) -> &str {
        match self {
            WorkItem::Action(action) => &action.tool,
            WorkItem::Intent(intent) => intent.kind(),
        }
    }

    fn tool_name(&self) -> &str {
        match self {
            WorkItem::Action(action) => &action.tool,
            WorkItem::Intent(intent) => tools::tool_name_for(intent),
        }
    }

    fn starting_message(&self) -> String {
        match self {
            WorkItem::Action(action) => match action.args.get("issue_key").and_then(|v| v.as_str()) {
                Some(key) => format!("Running {} on {key}", action.tool),
                None => format!("Running {}", action.tool),
            },
            WorkItem::Intent(intent) => intent.describe(),
        }
    }
}

/// Runs action and intent batches one item at a time, in input order.
///
/// Every item gets a `Started` event followed by exactly one terminal
/// event. A failing item never stops the batch. Cancellation is checked
/// before each item: the one in flight finishes, the rest are `Skipped`.
pub struct IntentExecutor {
    registry: Arc<CapabilityRegistry>,
    service: ServiceHandle,
    permissions: Arc<dyn PermissionChecker>,
}

impl IntentExecutor {
    pub fn new(registry: Arc<CapabilityRegistry>, service: ServiceHandle) -> Self {
        Self {
            registry,
            service,
            permissions: Arc::new(PolicyChecker::new(PermissionPolicy::allow_all())),
        }
    }

    pub fn with_permissions(mut self, checker: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = checker;
        self
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Dispatch parsed actions through the registry.
    pub async fn execute_actions(&self, actions: &[ActionInvocation], ctx: &RunContext) -> ExecutionReport {
        let items: Vec<WorkItem<'_>> = actions.iter().map(WorkItem::Action).collect();
        self.run(&items, ctx).await
    }

    /// Run typed intents directly against the issue service.
    pub async fn execute_intents(&self, intents: &[Intent], ctx: &RunContext) -> ExecutionReport {
        let items: Vec<WorkItem<'_>> = intents.iter().map(WorkItem::Intent).collect();
        self.run(&items, ctx).await
    }

    async fn run(&self, items: &[WorkItem<'_>], ctx: &RunContext) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        info!(count = items.len(), "executing batch");

        for (index, item) in items.iter().enumerate() {
            let label = item.label().to_string();
            if ctx.cancel.is_cancelled() {
                debug!(index, label = %label, "cancelled, skipping");
                report.push(
                    ctx,
                    ExecutionEvent {
                        index,
                        label,
                        status: ExecutionStatus::Skipped,
                        message: "Cancelled before start".to_string(),
                    },
                );
                continue;
            }

            report.push(
                ctx,
                ExecutionEvent {
                    index,
                    label: label.clone(),
                    status: ExecutionStatus::Started,
                    message: item.starting_message(),
                },
            );

            let result = self.run_item(item).await;
            let status = if result.success {
                ExecutionStatus::Succeeded
            } else {
                warn!(index, label = %label, message = result.message_or_default(), "item failed");
                ExecutionStatus::Failed
            };
            report.push(
                ctx,
                ExecutionEvent {
                    index,
                    label,
                    status,
                    message: result.message_or_default().to_string(),
                },
            );
            report.results.push((index, result));
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "batch complete"
        );
        report
    }

    async fn run_item(&self, item: &WorkItem<'_>) -> ToolResult {
        let intent_fields;
        let args = match item {
            WorkItem::Action(action) => &action.args,
            WorkItem::Intent(intent) => {
                intent_fields = match serde_json::to_value(intent) {
                    Ok(Value::Object(fields)) => fields,
                    _ => ToolArguments::new(),
                };
                &intent_fields
            }
        };
        let tool_name = item.tool_name();
        match self.permissions.check_permission(tool_name, args).await {
            PermissionDecision::Approved => {}
            PermissionDecision::Denied(reason) => {
                return ToolResult::failure(format!("Permission denied: {reason}"));
            }
            PermissionDecision::NeedsConfirmation => {
                return ToolResult::failure(format!("Tool '{tool_name}' requires user confirmation"));
            }
        }

        let outcome = match item {
            WorkItem::Action(action) => self.registry.execute(&action.tool, &action.args).await,
            WorkItem::Intent(intent) => match self.service.get() {
                Some(service) => execute_intent(service.as_ref(), intent).await,
                None => Ok(ToolResult::service_unavailable()),
            },
        };
        outcome.unwrap_or_else(ToolResult::from)
    }
}

/// Perform one typed intent against the service.
pub async fn execute_intent(service: &dyn IssueService, intent: &Intent) -> Result<ToolResult, ToolError> {
    match intent {
        Intent::Search { jql } => tools::search::search(service, jql, usize::MAX).await,
        Intent::Create { issue } => tools::create::create(service, issue).await,
        Intent::Update { issue_key, fields } => tools::update::update(service, issue_key, fields).await,
        Intent::LogWork {
            issue_key,
            seconds,
            comment,
        } => {
            if *seconds == 0 {
                return Ok(ToolResult::failure("Logged time must be positive"));
            }
            tools::worklog::log_work(service, issue_key, *seconds, comment.as_deref()).await
        }
        Intent::ChangeStatus { issue_key, status } => {
            tools::workflow::transition(service, issue_key, status).await
        }
        Intent::Comment { issue_key, body } => tools::comment::comment(service, issue_key, body).await,
        Intent::Delete { issue_key } => tools::delete::delete(service, issue_key).await,
        Intent::Assign { issue_key, assignee } => tools::people::assign(service, issue_key, assignee).await,
        Intent::AddWatcher { issue_key, watcher } => {
            tools::people::add_watcher(service, issue_key, watcher).await
        }
        Intent::Link {
            issue_key,
            other_key,
            link_type,
        } => tools::link::link(service, issue_key, other_key, link_type).await,
        Intent::FetchChangelog { issue_key } => tools::history::changelog(service, issue_key).await,
        Intent::ShowDetail { issue_key } => tools::search::show_detail(service, issue_key).await,
    }
}
