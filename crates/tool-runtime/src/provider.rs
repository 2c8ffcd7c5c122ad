use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::conversation::ConversationMessage;
use crate::stream::ModelEvent;

pub type ModelStream = Pin<Box<dyn Stream<Item = Result<ModelEvent, LlmError>> + Send>>;

/// Everything the model needs for one reply.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_prompt: Option<String>,
    /// Prior turns, oldest first
    pub history: Vec<ConversationMessage>,
    pub user_message: String,
}

/// The language-model collaborator.
///
/// Defined here by the consumer (the turn runner); transport, auth and
/// retries belong to implementations.
#[async_trait]
pub trait LanguageModelClient: Send + Sync {
    /// Stream a reply: zero or more `TextDelta` events, then `Completed`.
    async fn stream_reply(&self, request: ModelRequest) -> Result<ModelStream, LlmError>;

    /// Client name for logging (e.g., "scripted", "mock")
    fn client_name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("Stream error: {0}")]
    StreamError(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Replays a fixed reply as fixed-size chunks, then completes.
///
/// Used to drive the full pipeline from a recorded model reply.
pub struct ScriptedModelClient {
    reply: String,
    chunk_size: usize,
}

impl ScriptedModelClient {
    pub fn new(reply: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            reply: reply.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    fn chunks(&self) -> Vec<String> {
        let chars: Vec<char> = self.reply.chars().collect();
        chars
            .chunks(self.chunk_size)
            .map(|c| c.iter().collect())
            .collect()
    }
}

#[async_trait]
impl LanguageModelClient for ScriptedModelClient {
    async fn stream_reply(&self, _request: ModelRequest) -> Result<ModelStream, LlmError> {
        let mut events: Vec<Result<ModelEvent, LlmError>> = self
            .chunks()
            .into_iter()
            .map(|text| Ok(ModelEvent::TextDelta { text }))
            .collect();
        events.push(Ok(ModelEvent::Completed {
            text: None,
            intents: Vec::new(),
        }));
        Ok(Box::pin(futures::stream::iter(events)))
    }

    fn client_name(&self) -> &str {
        "scripted"
    }
}

/// Mock client for testing the turn runner without a real model.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use ticketeer_core::Intent;

    /// Returns queued replies in FIFO order and records every request.
    pub struct MockModelClient {
        replies: Mutex<VecDeque<Vec<ModelEvent>>>,
        requests: Mutex<Vec<ModelRequest>>,
    }

    impl Default for MockModelClient {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockModelClient {
        pub fn new() -> Self {
            Self {
                replies: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn queue_events(&self, events: Vec<ModelEvent>) {
            self.replies.lock().unwrap().push_back(events);
        }

        /// Queue a text reply delivered in one chunk.
        pub fn queue_text(&self, text: &str) {
            self.queue_events(vec![
                ModelEvent::TextDelta {
                    text: text.to_string(),
                },
                ModelEvent::Completed {
                    text: None,
                    intents: Vec::new(),
                },
            ]);
        }

        /// Queue a reply carrying typed intents.
        pub fn queue_intents(&self, text: &str, intents: Vec<Intent>) {
            self.queue_events(vec![ModelEvent::Completed {
                text: Some(text.to_string()),
                intents,
            }]);
        }

        pub fn requests(&self) -> Vec<ModelRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModelClient for MockModelClient {
        async fn stream_reply(&self, request: ModelRequest) -> Result<ModelStream, LlmError> {
            self.requests.lock().unwrap().push(request);
            let events = self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
                vec![ModelEvent::Completed {
                    text: None,
                    intents: Vec::new(),
                }]
            });
            Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
        }

        fn client_name(&self) -> &str {
            "mock"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn request() -> ModelRequest {
        ModelRequest {
            system_prompt: None,
            history: Vec::new(),
            user_message: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_scripted_client_chunks_reply() {
        let client = ScriptedModelClient::new("héllo wörld", 4);
        let events: Vec<ModelEvent> = client
            .stream_reply(request())
            .await
            .unwrap()
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            ModelEvent::TextDelta {
                text: "héll".to_string()
            }
        );
        assert!(matches!(events.last(), Some(ModelEvent::Completed { .. })));
    }

    #[tokio::test]
    async fn test_mock_client_is_fifo() {
        let client = mock::MockModelClient::new();
        client.queue_text("first");
        client.queue_text("second");
        let mut stream = client.stream_reply(request()).await.unwrap();
        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            ModelEvent::TextDelta {
                text: "first".to_string()
            }
        );
        assert_eq!(client.requests().len(), 1);
    }
}
