// HTTP client for OpenAI-compatible chat completion endpoints (llama.cpp server, etc.)

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::types::ChatMessage;
use super::{CompletionClient, CompletionError};
use crate::config::EndpointConfig;

/// Completion client that POSTs the whole conversation and waits for the whole answer
#[derive(Clone)]
pub struct HttpCompletionClient {
    client: Client,
    url: String,
    model: Option<String>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

impl HttpCompletionClient {
    pub fn new(endpoint: &EndpointConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: endpoint.chat_url(),
            model: endpoint.model.clone(),
            temperature: endpoint.temperature,
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let request = ChatRequest {
            messages,
            temperature: self.temperature,
            model: self.model.as_deref(),
        };

        tracing::debug!(
            url = %self.url,
            messages = messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let text = extract_content(&body)?;
        tracing::debug!(chars = text.len(), "Received completion");
        Ok(text)
    }
}

/// Pull `choices[0].message.content` out of a response body
fn extract_content(body: &str) -> Result<String, CompletionError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| CompletionError::Malformed(format!("invalid JSON: {e}")))?;

    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            CompletionError::Malformed("missing choices[0].message.content".to_string())
        })
}

/// Error bodies can be whole HTML pages; keep the first few hundred chars
fn truncate_body(body: &str) -> String {
    const MAX_CHARS: usize = 300;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_CHARS) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
