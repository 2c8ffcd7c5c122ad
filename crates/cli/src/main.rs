mod cli;
mod config;
mod terminal;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Read;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use ticketeer_core::config::load_dotenv;
use ticketeer_core::{Config, InMemoryIssueService, Intent, IssueService, ServiceHandle};
use ticketeer_tool_runtime::{
    CapabilityRegistry, Conversation, ExecutionEvent, ExecutionReport, IntentExecutor,
    IssueTrackerCapability, PermissionChecker, PolicyChecker, RunContext, ScriptedModelClient,
    TurnRunner,
};

use crate::cli::{CliArgs, Command};
use crate::config::{CliConfig, Settings};
use crate::terminal::{EventFeed, InteractiveChecker, Terminal};

const DEMO_SEED: &str = include_str!("demo_seed.json");

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    load_dotenv();

    let env_config = match &args.profile {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    let file_config = CliConfig::load(args.config.as_deref())
        .context("failed to load configuration")?;
    let settings = file_config
        .resolve(&env_config, &args)
        .context("invalid configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_filter)),
        )
        .with_target(false)
        .init();
    env_config.log_summary();

    let terminal = Terminal::new();
    let tracker = Arc::new(open_tracker(&settings)?);
    let service: Arc<dyn IssueService> = tracker.clone();

    let registry = Arc::new(CapabilityRegistry::new());
    registry.register(
        IssueTrackerCapability::for_service(&service)
            .with_default_project(settings.default_project.clone()),
    );
    info!(tools = registry.len(), "tool registry ready");

    match &args.command {
        Command::Schema => {
            let schema = serde_json::to_string_pretty(&registry.generate_schema())
                .context("failed to serialize tool schema")?;
            println!("{}", schema);
            Ok(())
        }
        Command::Prompt => {
            println!("{}", registry.generate_prompt_text());
            Ok(())
        }
        Command::Replay { input, message } => {
            let reply = read_input(input)?;
            let (ctx, feed) = run_context(&terminal);
            let executor = build_executor(&registry, &service, &settings, input, &terminal, &feed);
            terminal.print_banner("replay", env_config.profile_label(), tracker.issue_count())?;

            let runner = TurnRunner::new(
                Arc::new(ScriptedModelClient::new(reply, settings.chunk_size)),
                executor,
            );
            let mut conversation = Conversation::new(settings.max_context_tokens);
            let printer = tokio::spawn(feed.run());

            let result = runner.run(&mut conversation, message.clone(), &ctx).await;
            drop(ctx);
            printer.await.ok();

            match result {
                Ok(outcome) => {
                    terminal.display_reply(&outcome.display_text)?;
                    finish(&terminal, &outcome.report)
                }
                Err(e) => {
                    terminal.print_error(&e.to_string())?;
                    Err(e).context("turn did not complete")
                }
            }
        }
        Command::Intents { input } => {
            let raw = read_input(input)?;
            let intents: Vec<Intent> = serde_json::from_str(&raw)
                .with_context(|| format!("invalid intent list in '{}'", input))?;
            let (ctx, feed) = run_context(&terminal);
            let executor = build_executor(&registry, &service, &settings, input, &terminal, &feed);
            terminal.print_banner("intents", env_config.profile_label(), tracker.issue_count())?;

            let printer = tokio::spawn(feed.run());
            let report = executor.execute_intents(&intents, &ctx).await;
            drop(ctx);
            printer.await.ok();

            finish(&terminal, &report)
        }
    }
}

/// Seed from the configured file, or the bundled demo project.
fn open_tracker(settings: &Settings) -> Result<InMemoryIssueService> {
    let (json, source) = match &settings.seed_file {
        Some(path) => (
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read seed file: {}", path.display()))?,
            path.display().to_string(),
        ),
        None => (DEMO_SEED.to_string(), "built-in demo".to_string()),
    };
    let tracker = InMemoryIssueService::from_json(&json)
        .with_context(|| format!("failed to load seed: {}", source))?;
    info!(seed = %source, issues = tracker.issue_count(), "tracker seeded");
    Ok(tracker)
}

/// `-` reads stdin, anything else is a path.
fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read '{}'", input))
    }
}

/// Confirmation prompts need stdin, so piped input falls back to the plain policy.
fn build_executor(
    registry: &Arc<CapabilityRegistry>,
    service: &Arc<dyn IssueService>,
    settings: &Settings,
    input: &str,
    terminal: &Terminal,
    feed: &EventFeed,
) -> Arc<IntentExecutor> {
    let checker: Arc<dyn PermissionChecker> = if input == "-" {
        Arc::new(PolicyChecker::new(settings.policy.clone()))
    } else {
        Arc::new(
            InteractiveChecker::new(settings.policy.clone(), terminal.clone())
                .with_feed(feed.clone()),
        )
    };
    Arc::new(
        IntentExecutor::new(registry.clone(), ServiceHandle::new(service)).with_permissions(checker),
    )
}

/// Wire Ctrl+C to the cancel flag and open the event channel.
/// A running feed finishes once the returned context is dropped.
fn run_context(terminal: &Terminal) -> (RunContext, EventFeed) {
    let cancel = terminal.cancel_flag();
    let signal_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, skipping remaining actions");
            signal_flag.cancel();
        }
    });

    let (tx, rx) = mpsc::unbounded_channel::<ExecutionEvent>();
    let feed = EventFeed::new(rx, terminal.clone());
    (RunContext::new().with_cancel(cancel).with_events(tx), feed)
}

fn finish(terminal: &Terminal, report: &ExecutionReport) -> Result<()> {
    if report.is_empty() {
        terminal.print_info("No actions to run.")?;
        return Ok(());
    }
    terminal.print_summary(report)?;
    if report.failed > 0 {
        bail!(
            "{} of {} actions failed",
            report.failed,
            report.succeeded + report.failed + report.skipped
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_seed_loads() {
        let tracker = InMemoryIssueService::from_json(DEMO_SEED).unwrap();
        assert_eq!(tracker.issue_count(), 4);
        assert_eq!(tracker.status_of("DEMO-3").as_deref(), Some("In Review"));
    }

    #[test]
    fn test_missing_input_file_is_reported() {
        let err = read_input("/nonexistent/ticketeer/reply.txt").unwrap_err();
        assert!(err.to_string().contains("reply.txt"));
    }

    #[test]
    fn test_seed_file_overrides_demo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(
            &path,
            r#"{"issues": [{"key": "X-1", "summary": "Only one", "status": "To Do"}]}"#,
        )
        .unwrap();
        let settings = Settings {
            default_project: None,
            seed_file: Some(path),
            log_filter: "warn".to_string(),
            chunk_size: 16,
            policy: ticketeer_tool_runtime::PermissionPolicy::allow_all(),
            max_context_tokens: 1000,
        };
        let tracker = open_tracker(&settings).unwrap();
        assert_eq!(tracker.issue_count(), 1);
    }

    #[tokio::test]
    async fn test_intent_batch_against_demo_tracker() {
        let tracker = Arc::new(InMemoryIssueService::from_json(DEMO_SEED).unwrap());
        let service: Arc<dyn IssueService> = tracker.clone();
        let registry = Arc::new(CapabilityRegistry::new());
        registry.register(IssueTrackerCapability::for_service(&service));
        let executor = IntentExecutor::new(registry, ServiceHandle::new(&service));

        let intents: Vec<Intent> = serde_json::from_str(
            r#"[
                {"type": "assign", "issue_key": "DEMO-3", "assignee": "ben"},
                {"type": "comment", "issue_key": "DEMO-3", "body": "Taking this"}
            ]"#,
        )
        .unwrap();
        let report = executor.execute_intents(&intents, &RunContext::new()).await;
        assert!(report.all_succeeded());
        assert_eq!(tracker.assignee_of("DEMO-3").as_deref(), Some("ben"));
    }
}
