// Thinking → Drafting → Validation pipeline over one user request

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::progress::ProgressReporter;
use super::timed_loop::TimedLoop;
use super::TurnError;
use crate::completion::{ChatMessage, CompletionClient};
use crate::config::RefineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Thinking,
    Drafting,
    Validation,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Thinking => "Thinking",
            Phase::Drafting => "Drafting",
            Phase::Validation => "Validation",
        }
    }

    /// Final user turn sent when the phase starts
    pub fn directive(&self) -> &'static str {
        match self {
            Phase::Thinking => {
                "Before answering, think through the request above step by step: clarify \
                 what is being asked, identify the data, constraints, and edge cases involved, \
                 and outline the approach. Do NOT write the final answer yet. \
                 Output only your reasoning."
            }
            Phase::Drafting => {
                "Based on your reasoning above, write the final deliverable for the original \
                 request. Output only the deliverable, with any code in fenced code blocks."
            }
            Phase::Validation => {
                "Validate the draft above against the original request. Check correctness, \
                 completeness, and edge cases. If anything is wrong or can be improved, output \
                 the corrected final version. If it is already optimal, output it unchanged. \
                 Output only the final version."
            }
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// System instruction: role text, then injected context when there is any
pub fn build_system_instruction(role: &str, context: &str) -> ChatMessage {
    let context = context.trim();
    if context.is_empty() {
        ChatMessage::system(role.trim())
    } else {
        ChatMessage::system(format!("{}\n\nProject context:\n{}", role.trim(), context))
    }
}

/// Runs the three phases for one request.
///
/// Reads history but never writes it; committing the answer is the session's job.
pub struct PhaseController {
    timed_loop: TimedLoop,
    system: ChatMessage,
    thinking: Duration,
    validation: Duration,
}

impl PhaseController {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        progress: ProgressReporter,
        refine: &RefineConfig,
        system: ChatMessage,
    ) -> Self {
        Self {
            timed_loop: TimedLoop::new(client, progress, refine.retry_delay()),
            system,
            thinking: refine.thinking(),
            validation: refine.validation(),
        }
    }

    pub fn system_message(&self) -> &ChatMessage {
        &self.system
    }

    /// Minimum wall-clock duration of a phase; zero means single-shot
    pub fn min_duration(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Thinking => self.thinking,
            Phase::Drafting => Duration::ZERO,
            Phase::Validation => self.validation,
        }
    }

    /// `{system} + history + request`
    pub fn base_messages(&self, history: &[ChatMessage], request: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(self.system.clone());
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(request));
        messages
    }

    /// Turn one request into a final answer
    pub async fn run_session_turn(
        &self,
        history: &[ChatMessage],
        request: &str,
    ) -> Result<String, TurnError> {
        let base = self.base_messages(history, request);

        let reasoning = self
            .run_phase(Phase::Thinking, &base, None)
            .await
            .ok_or(TurnError::PhaseAborted {
                phase: Phase::Thinking,
            })?;

        let draft = self
            .run_phase(Phase::Drafting, &base, Some(reasoning))
            .await
            .ok_or(TurnError::PhaseAborted {
                phase: Phase::Drafting,
            })?;

        match self
            .run_phase(Phase::Validation, &base, Some(draft.clone()))
            .await
        {
            Some(validated) => Ok(validated),
            None => {
                warn!("Validation produced no output; keeping the draft");
                Ok(draft)
            }
        }
    }

    async fn run_phase(
        &self,
        phase: Phase,
        base: &[ChatMessage],
        previous: Option<String>,
    ) -> Option<String> {
        let mut messages = base.to_vec();
        if let Some(previous) = previous {
            messages.push(ChatMessage::assistant(previous));
        }
        messages.push(ChatMessage::user(phase.directive()));

        info!(phase = phase.name(), "Starting phase");
        self.timed_loop
            .run(&messages, phase.name(), self.min_duration(phase))
            .await
    }
}
