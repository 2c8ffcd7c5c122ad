use serde::{Deserialize, Serialize};
use ticketeer_core::Intent;

use crate::parser::{ActionInvocation, ActionParser};

/// Events emitted by a `LanguageModelClient` while producing one reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelEvent {
    /// A chunk of reply text
    TextDelta { text: String },
    /// Terminal result. `text`, when present, supersedes the streamed chunks.
    Completed {
        text: Option<String>,
        intents: Vec<Intent>,
    },
    /// A non-fatal problem reported by the model transport
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    Streaming,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("reply already completed; late chunk rejected")]
    AlreadyCompleted,
}

/// Single-writer buffer for one streamed reply.
///
/// Chunks are appended while `Streaming`. The terminal event moves it to
/// `Completed`, after which writes are rejected. [`Self::finalize`] consumes
/// the accumulator and is the only way to obtain the text for parsing.
#[derive(Debug)]
pub struct ResponseAccumulator {
    state: AccumulatorState,
    buffer: String,
    final_text: Option<String>,
    intents: Vec<Intent>,
    chunks: usize,
    errors: Vec<String>,
}

impl Default for ResponseAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self {
            state: AccumulatorState::Streaming,
            buffer: String::new(),
            final_text: None,
            intents: Vec::new(),
            chunks: 0,
            errors: Vec::new(),
        }
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    /// Text received so far.
    pub fn partial_text(&self) -> &str {
        &self.buffer
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    pub fn push_chunk(&mut self, text: &str) -> Result<(), StreamError> {
        if self.state == AccumulatorState::Completed {
            return Err(StreamError::AlreadyCompleted);
        }
        self.buffer.push_str(text);
        self.chunks += 1;
        Ok(())
    }

    pub fn complete(&mut self, text: Option<String>, intents: Vec<Intent>) -> Result<(), StreamError> {
        if self.state == AccumulatorState::Completed {
            return Err(StreamError::AlreadyCompleted);
        }
        self.final_text = text;
        self.intents = intents;
        self.state = AccumulatorState::Completed;
        Ok(())
    }

    pub fn apply(&mut self, event: ModelEvent) -> Result<(), StreamError> {
        match event {
            ModelEvent::TextDelta { text } => self.push_chunk(&text),
            ModelEvent::Completed { text, intents } => self.complete(text, intents),
            ModelEvent::Error { message } => {
                self.errors.push(message);
                Ok(())
            }
        }
    }

    /// Close the reply. A stream that ended without a terminal event is
    /// treated as completed with the chunks received.
    pub fn finalize(self) -> CompletedResponse {
        let text = self.final_text.unwrap_or(self.buffer);
        CompletedResponse {
            text,
            intents: self.intents,
            transport_errors: self.errors,
        }
    }
}

/// A fully received model reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedResponse {
    pub text: String,
    pub intents: Vec<Intent>,
    #[serde(default)]
    pub transport_errors: Vec<String>,
}

impl CompletedResponse {
    pub fn actions(&self, parser: &ActionParser) -> Vec<ActionInvocation> {
        parser.parse(&self.text)
    }

    /// Reply text without action lines.
    pub fn display_text(&self, parser: &ActionParser) -> String {
        parser.strip_action_lines(&self.text)
    }
}
