// Time-boxed refinement loop
//
// Re-queries the endpoint with its own previous output until the minimum
// duration has elapsed. Iterations are strictly sequential.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::progress::ProgressReporter;
use crate::completion::{ChatMessage, CompletionClient};

/// User turn appended before every refinement iteration
pub fn refinement_directive(phase_label: &str, remaining: Duration) -> String {
    format!(
        "Refinement pass for the {phase_label} phase (about {secs:.0}s remaining). \
         Critically review your previous output above: look for mistakes, omissions, \
         and weak or unclear parts. Then write an improved, complete version. \
         Output only the improved version.",
        secs = remaining.as_secs_f64()
    )
}

pub struct TimedLoop {
    client: Arc<dyn CompletionClient>,
    progress: ProgressReporter,
    retry_delay: Duration,
}

impl TimedLoop {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        progress: ProgressReporter,
        retry_delay: Duration,
    ) -> Self {
        Self {
            client,
            progress,
            retry_delay,
        }
    }

    /// Run one phase.
    ///
    /// Returns `None` only when the initial call fails. Otherwise returns the
    /// last successful output; a failed refinement never replaces it.
    pub async fn run(
        &self,
        initial_messages: &[ChatMessage],
        phase_label: &str,
        min_duration: Duration,
    ) -> Option<String> {
        let start = Instant::now();
        let mut messages = initial_messages.to_vec();

        let initial = self
            .progress
            .track(
                format!("{phase_label} (Initial)"),
                start,
                self.client.complete(&messages),
            )
            .await;

        let mut current_output = match initial {
            Ok(text) => text,
            Err(e) => {
                warn!(phase = phase_label, "Initial completion failed: {}", e);
                self.progress
                    .sink()
                    .notice(&format!("{phase_label} failed: {e}"));
                return None;
            }
        };

        let mut iteration = 0usize;
        let mut failures = 0usize;

        while start.elapsed() < min_duration {
            iteration += 1;
            let checkpoint = messages.len();
            let remaining = min_duration.saturating_sub(start.elapsed());

            messages.push(ChatMessage::assistant(current_output.clone()));
            messages.push(ChatMessage::user(refinement_directive(
                phase_label,
                remaining,
            )));

            let result = self
                .progress
                .track(
                    format!("{phase_label} (Iter {iteration})"),
                    start,
                    self.client.complete(&messages),
                )
                .await;

            match result {
                Ok(text) => {
                    debug!(phase = phase_label, iteration, chars = text.len(), "Refined");
                    current_output = text;
                }
                Err(e) => {
                    failures += 1;
                    // Drop the speculative turns so a stale directive never lingers
                    messages.truncate(checkpoint);
                    warn!(phase = phase_label, iteration, "Refinement failed: {}", e);
                    self.progress.sink().notice(&format!(
                        "{phase_label} (Iter {iteration}) failed, keeping previous output: {e}"
                    ));

                    let pause = self
                        .retry_delay
                        .min(min_duration.saturating_sub(start.elapsed()));
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                }
            }
        }

        info!(
            phase = phase_label,
            iterations = iteration,
            failures,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Phase complete"
        );

        Some(current_output)
    }
}
