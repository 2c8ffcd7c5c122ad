use serde::{Deserialize, Serialize};
use ticketeer_core::Intent;

use crate::parser::ActionInvocation;

/// A message in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConversationMessage {
    User(String),
    Assistant(AssistantContent),
    /// What happened when a requested action ran
    Outcome(ActionOutcome),
}

/// A model reply, split into prose and the calls it requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantContent {
    /// Reply text with action lines removed
    pub text: Option<String>,
    pub actions: Vec<ActionInvocation>,
    pub intents: Vec<Intent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Tool name or intent kind
    pub label: String,
    pub success: bool,
    pub message: String,
}

/// Conversation history with a rough context budget.
pub struct Conversation {
    messages: Vec<ConversationMessage>,
    /// Approximate token budget before the oldest messages are dropped
    max_tokens: usize,
    /// Fixed system prompt. When unset the turn runner uses the registry's
    /// current tool catalogue.
    system_prompt: Option<String>,
}

impl Conversation {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_tokens,
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn add_user_message(&mut self, text: String) {
        self.messages.push(ConversationMessage::User(text));
        self.maybe_truncate();
    }

    pub fn add_assistant_response(&mut self, content: AssistantContent) {
        self.messages.push(ConversationMessage::Assistant(content));
        self.maybe_truncate();
    }

    pub fn add_outcome(&mut self, outcome: ActionOutcome) {
        self.messages.push(ConversationMessage::Outcome(outcome));
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Character count / 4.
    pub fn approximate_tokens(&self) -> usize {
        let char_count: usize = self
            .messages
            .iter()
            .map(|m| match m {
                ConversationMessage::User(text) => text.len(),
                ConversationMessage::Assistant(content) => {
                    content.text.as_ref().map_or(0, |t| t.len())
                        + content
                            .actions
                            .iter()
                            .map(|a| a.to_action_line().len())
                            .sum::<usize>()
                        + content
                            .intents
                            .iter()
                            .map(|i| i.describe().len())
                            .sum::<usize>()
                }
                ConversationMessage::Outcome(outcome) => outcome.label.len() + outcome.message.len(),
            })
            .sum();
        char_count / 4
    }

    /// Drop the oldest messages while over budget, keeping the last two.
    fn maybe_truncate(&mut self) {
        while self.approximate_tokens() > self.max_tokens && self.messages.len() > 2 {
            self.messages.remove(0);
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(100_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_basic() {
        let mut conv = Conversation::new(100_000);
        conv.add_user_message("Hello".to_string());
        conv.add_assistant_response(AssistantContent {
            text: Some("Hi there!".to_string()),
            ..Default::default()
        });
        assert_eq!(conv.messages().len(), 2);
    }

    #[test]
    fn test_conversation_with_outcomes() {
        let mut conv = Conversation::new(100_000);
        conv.add_user_message("Close X-1".to_string());
        conv.add_assistant_response(AssistantContent {
            text: Some("Closing it.".to_string()),
            actions: crate::parser::parse_actions(
                r#"ACTION: {"tool": "transition_issue", "args": {"issue_key": "X-1", "status": "Done"}}"#,
            ),
            intents: vec![],
        });
        conv.add_outcome(ActionOutcome {
            label: "transition_issue".to_string(),
            success: true,
            message: "Moved X-1 to Done".to_string(),
        });
        assert_eq!(conv.messages().len(), 3);
        assert!(conv.approximate_tokens() > 0);
    }

    #[test]
    fn test_conversation_truncation() {
        let mut conv = Conversation::new(10);
        for i in 0..100 {
            conv.add_user_message(format!("This is a longer message number {} with padding text", i));
        }
        assert!(conv.messages().len() <= 4);
    }

    #[test]
    fn test_serialization() {
        let mut conv = Conversation::new(100_000);
        conv.add_user_message("test".to_string());
        let json = serde_json::to_string(&conv.messages()[0]).unwrap();
        let back: ConversationMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, conv.messages()[0]);
    }
}
