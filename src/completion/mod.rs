// Completion endpoint abstraction
//
// The refinement core only ever talks to `dyn CompletionClient`: one ordered
// conversation in, one whole response out. Retrying is the caller's business.

use async_trait::async_trait;
use thiserror::Error;

pub mod http;
pub mod types;

#[cfg(test)]
pub(crate) mod scripted;

pub use http::HttpCompletionClient;
pub use types::{ChatMessage, Role};

/// Why a single completion call produced no text
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    /// Connection refused, timeout, or the body could not be read
    #[error("transport failure: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response did not carry `choices[0].message.content`
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A synchronous-per-call chat completion endpoint.
///
/// `complete` blocks the calling task until the endpoint answers or fails.
/// Implementations must not retry internally.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send the full ordered conversation and return the generated text
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}
