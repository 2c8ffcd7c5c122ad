use anyhow::Result;
use async_trait::async_trait;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::future::poll_fn;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

use ticketeer_tool_runtime::{
    CancelFlag, ExecutionEvent, ExecutionReport, ExecutionStatus, PermissionChecker,
    PermissionDecision, PermissionLevel, PermissionPolicy, ToolArguments,
};

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const PROMPT: Color = Color::Green;
    const ASSISTANT_TEXT: Color = Color::Cyan;
    const STARTED: Color = Color::Yellow;
    const SUCCEEDED: Color = Color::DarkGreen;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

/// Manages terminal output for a run.
#[derive(Clone, Default)]
pub struct Terminal {
    /// Set when Ctrl+C is pressed to cancel the remaining actions.
    cancel: CancelFlag,
}

impl Terminal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared cancellation flag for the executor and the signal task.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Print the run header.
    pub fn print_banner(&self, command: &str, profile: &str, issues: usize) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("ticketeer"),
            ResetColor,
            Print(format!(" {}\n", command)),
            SetForegroundColor(Colors::DIM),
            Print(format!("Profile: {} | Issues loaded: {}\n", profile, issues)),
            Print("Ctrl+C skips the remaining actions.\n"),
            Print("---\n"),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Display one execution status change.
    pub fn display_event(&self, event: &ExecutionEvent) -> Result<()> {
        let mut stdout = io::stdout();
        let (color, marker) = match event.status {
            ExecutionStatus::Started => (Colors::STARTED, "..."),
            ExecutionStatus::Succeeded => (Colors::SUCCEEDED, "ok"),
            ExecutionStatus::Failed => (Colors::ERROR, "failed"),
            ExecutionStatus::Skipped => (Colors::DIM, "skipped"),
        };
        let line = match event.status {
            ExecutionStatus::Started => format!("[{}] {} {}\n", event.index + 1, event.label, marker),
            _ => format!("  [{}] {}\n", marker, indent(&event.message)),
        };
        execute!(stdout, SetForegroundColor(color), Print(line), ResetColor)?;
        stdout.flush()?;
        Ok(())
    }

    /// Display the reply text the user sees (action lines removed).
    pub fn display_reply(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::PROMPT),
            Print("assistant> "),
            SetForegroundColor(Colors::ASSISTANT_TEXT),
            Print(format!("{}\n", text.trim_end())),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// One-line tally after a batch.
    pub fn print_summary(&self, report: &ExecutionReport) -> Result<()> {
        let color = if report.all_succeeded() {
            Colors::SUCCEEDED
        } else {
            Colors::ERROR
        };
        let mut stdout = io::stdout();
        execute!(
            stdout,
            Print("---\n"),
            SetForegroundColor(color),
            Print(format!(
                "{} succeeded, {} failed, {} skipped\n",
                report.succeeded, report.failed, report.skipped
            )),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Prompt the user for a yes/no permission decision.
    pub fn prompt_permission(&self, tool_name: &str, input_summary: &str) -> Result<bool> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            Print("\n"),
            SetForegroundColor(Colors::STARTED),
            Print(format!(
                "Tool '{}' requires confirmation.\n  Input: {}\n",
                tool_name, input_summary
            )),
            ResetColor,
            SetForegroundColor(Colors::PROMPT),
            Print("Allow? [Y/n] "),
            ResetColor,
        )?;
        stdout.flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(is_yes(&input))
    }

    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::ERROR),
            Print(format!("Error: {}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_info(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }
}

fn is_yes(input: &str) -> bool {
    let trimmed = input.trim().to_lowercase();
    trimmed.is_empty() || trimmed == "y" || trimmed == "yes"
}

/// Continuation lines of multi-line results line up under the marker.
fn indent(message: &str) -> String {
    message.replace('\n', "\n      ")
}

/// Receiving end of the execution event channel.
///
/// The printer task and the permission prompt share it, so everything queued
/// before a prompt is on screen before the question is asked.
#[derive(Clone)]
pub struct EventFeed {
    rx: Arc<Mutex<UnboundedReceiver<ExecutionEvent>>>,
    terminal: Terminal,
}

impl EventFeed {
    pub fn new(rx: UnboundedReceiver<ExecutionEvent>, terminal: Terminal) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
            terminal,
        }
    }

    fn lock(&self) -> MutexGuard<'_, UnboundedReceiver<ExecutionEvent>> {
        self.rx.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn show(&self, event: &ExecutionEvent) {
        if let Err(e) = self.terminal.display_event(event) {
            warn!(error = %e, "failed to display event");
        }
    }

    /// Print every event already queued.
    pub fn flush(&self) {
        let mut rx = self.lock();
        while let Ok(event) = rx.try_recv() {
            self.show(&event);
        }
    }

    /// Print events as they arrive until every sender is gone.
    pub async fn run(self) {
        while poll_fn(|cx| self.poll_show(cx)).await {}
    }

    /// Events are printed while the lock is held so `flush` never races a
    /// half-printed one.
    fn poll_show(&self, cx: &mut Context<'_>) -> Poll<bool> {
        let mut rx = self.lock();
        match rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                self.show(&event);
                Poll::Ready(true)
            }
            Poll::Ready(None) => Poll::Ready(false),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Policy checker that asks on the terminal for `confirm` tools.
///
/// Only used when stdin is free, i.e. the reply was read from a file.
pub struct InteractiveChecker {
    policy: PermissionPolicy,
    terminal: Terminal,
    feed: Option<EventFeed>,
}

impl InteractiveChecker {
    pub fn new(policy: PermissionPolicy, terminal: Terminal) -> Self {
        Self {
            policy,
            terminal,
            feed: None,
        }
    }

    /// Drain this feed before each prompt.
    pub fn with_feed(mut self, feed: EventFeed) -> Self {
        self.feed = Some(feed);
        self
    }
}

#[async_trait]
impl PermissionChecker for InteractiveChecker {
    async fn check_permission(&self, tool_name: &str, args: &ToolArguments) -> PermissionDecision {
        match self.policy.level_for(tool_name) {
            PermissionLevel::AutoApprove => PermissionDecision::Approved,
            PermissionLevel::Deny => {
                PermissionDecision::Denied(format!("Tool '{}' is denied by policy", tool_name))
            }
            PermissionLevel::RequireConfirmation => {
                if let Some(feed) = &self.feed {
                    feed.flush();
                }
                let summary = serde_json::to_string(args).unwrap_or_default();
                match self.terminal.prompt_permission(tool_name, &summary) {
                    Ok(true) => PermissionDecision::Approved,
                    Ok(false) => PermissionDecision::Denied("declined by user".to_string()),
                    Err(e) => {
                        warn!(tool = tool_name, error = %e, "permission prompt failed");
                        PermissionDecision::Denied("confirmation unavailable".to_string())
                    }
                }
            }
        }
    }
}
