use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::conversation::{AssistantContent, Conversation};
use crate::executor::{ExecutionReport, IntentExecutor, RunContext};
use crate::parser::{ActionInvocation, ActionParser};
use crate::provider::{LanguageModelClient, LlmError, ModelRequest};
use crate::stream::{CompletedResponse, ResponseAccumulator};

/// Result of one conversation turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: CompletedResponse,
    /// Reply text without action lines
    pub display_text: String,
    /// Actions parsed from the reply. Empty when the reply carried intents.
    pub actions: Vec<ActionInvocation>,
    pub report: ExecutionReport,
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
    #[error("Turn cancelled while the reply was streaming")]
    Cancelled,
}

/// Drives one turn: model reply in, ordered actions out.
///
/// Flow: user message → model stream → accumulator → finalize → typed
/// intents if the reply carried any, otherwise parsed action lines →
/// executor → history.
pub struct TurnRunner {
    client: Arc<dyn LanguageModelClient>,
    executor: Arc<IntentExecutor>,
    parser: ActionParser,
}

impl TurnRunner {
    pub fn new(client: Arc<dyn LanguageModelClient>, executor: Arc<IntentExecutor>) -> Self {
        Self {
            client,
            executor,
            parser: ActionParser::new(),
        }
    }

    pub fn with_parser(mut self, parser: ActionParser) -> Self {
        self.parser = parser;
        self
    }

    pub async fn run(
        &self,
        conversation: &mut Conversation,
        user_message: String,
        ctx: &RunContext,
    ) -> Result<TurnOutcome, TurnError> {
        let system_prompt = conversation
            .system_prompt()
            .map(String::from)
            .unwrap_or_else(|| self.executor.registry().generate_prompt_text());
        let request = ModelRequest {
            system_prompt: Some(system_prompt),
            history: conversation.messages().to_vec(),
            user_message: user_message.clone(),
        };
        conversation.add_user_message(user_message);

        debug!(client = self.client.client_name(), "requesting reply");
        let mut stream = self.client.stream_reply(request).await?;
        let mut accumulator = ResponseAccumulator::new();

        while let Some(event) = stream.next().await {
            if ctx.cancel.is_cancelled() {
                info!(chunks = accumulator.chunk_count(), "turn cancelled during streaming");
                return Err(TurnError::Cancelled);
            }
            if let Err(e) = accumulator.apply(event?) {
                warn!(error = %e, "dropping stream event");
            }
        }

        let response = accumulator.finalize();
        for message in &response.transport_errors {
            warn!(message = %message, "model stream reported an error");
        }
        let display_text = response.display_text(&self.parser);

        let (actions, report) = if response.intents.is_empty() {
            let actions = response.actions(&self.parser);
            let report = self.executor.execute_actions(&actions, ctx).await;
            (actions, report)
        } else {
            let report = self.executor.execute_intents(&response.intents, ctx).await;
            (Vec::new(), report)
        };

        conversation.add_assistant_response(AssistantContent {
            text: (!display_text.is_empty()).then(|| display_text.clone()),
            actions: actions.clone(),
            intents: response.intents.clone(),
        });
        for outcome in report.outcomes() {
            conversation.add_outcome(outcome);
        }

        info!(
            actions = actions.len(),
            intents = response.intents.len(),
            failed = report.failed,
            "turn complete"
        );
        Ok(TurnOutcome {
            response,
            display_text,
            actions,
            report,
        })
    }
}
