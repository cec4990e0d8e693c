// Scripted completion client for unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use super::{ChatMessage, CompletionClient, CompletionError};

/// Replays canned replies in order, each after a virtual latency.
///
/// Once the script runs out, `fallback` is returned for every further call.
pub(crate) struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    fallback: Result<String, CompletionError>,
    latency: Duration,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedClient {
    pub(crate) fn new(replies: Vec<Result<String, CompletionError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: Err(CompletionError::Transport("script exhausted".to_string())),
            latency: Duration::from_secs(1),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call succeeds with the same text
    pub(crate) fn always(text: &str) -> Self {
        Self::new(Vec::new()).with_fallback(Ok(text.to_string()))
    }

    /// Every call fails
    pub(crate) fn failing() -> Self {
        Self::new(Vec::new())
    }

    pub(crate) fn with_fallback(mut self, fallback: Result<String, CompletionError>) -> Self {
        self.fallback = fallback;
        self
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

pub(crate) fn ok(text: &str) -> Result<String, CompletionError> {
    Ok(text.to_string())
}

pub(crate) fn fail() -> Result<String, CompletionError> {
    Err(CompletionError::Transport("connection reset".to_string()))
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        tokio::time::sleep(self.latency).await;
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
