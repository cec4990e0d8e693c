// Session state: the persistent conversation and the feedback sub-loop

use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

use super::phases::PhaseController;
use super::progress::ProgressReporter;
use super::TurnError;
use crate::completion::{ChatMessage, CompletionClient, Role};
use crate::config::RefineConfig;

/// Append-only ordered record of user/assistant turns
#[derive(Debug, Clone, Default)]
pub struct History {
    messages: Vec<ChatMessage>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(ChatMessage::new(role, content));
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }

    pub fn as_slice(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Most recent assistant turn, if any
    pub fn last_answer(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }
}

/// User turn asking to regenerate the previous answer
pub fn feedback_directive(feedback: &str) -> String {
    format!(
        "Feedback on your previous answer: \"{}\"\n\
         Regenerate your previous answer, taking this feedback into account. \
         Output only the revised answer.",
        feedback.trim()
    )
}

/// One interactive session: sole owner and writer of the history.
///
/// A turn commits its request and answer together or not at all.
pub struct Session {
    history: History,
    phases: PhaseController,
    client: Arc<dyn CompletionClient>,
    progress: ProgressReporter,
}

impl Session {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        progress: ProgressReporter,
        refine: &RefineConfig,
        system: ChatMessage,
    ) -> Self {
        let phases = PhaseController::new(Arc::clone(&client), progress.clone(), refine, system);
        Self {
            history: History::new(),
            phases,
            client,
            progress,
        }
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.history.append(role, content);
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.history.snapshot()
    }

    /// Run the phase pipeline for `request` and commit the answer
    pub async fn run_turn(&mut self, request: &str) -> Result<String, TurnError> {
        let answer = self
            .phases
            .run_session_turn(self.history.as_slice(), request)
            .await?;

        self.append(Role::User, request);
        self.append(Role::Assistant, answer.clone());
        info!(turns = self.history.len(), "Turn committed");
        Ok(answer)
    }

    /// Regenerate the last answer with user feedback.
    ///
    /// Blank feedback returns `Ok(None)` without calling the endpoint.
    pub async fn feedback_turn(&mut self, feedback: &str) -> Result<Option<String>, TurnError> {
        if feedback.trim().is_empty() {
            return Ok(None);
        }
        if self.history.last_answer().is_none() {
            warn!("Feedback given before any answer; ignoring");
            return Ok(None);
        }

        let directive = feedback_directive(feedback);
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(self.phases.system_message().clone());
        messages.extend_from_slice(self.history.as_slice());
        messages.push(ChatMessage::user(directive.clone()));

        let revised = self
            .progress
            .track("Revising", Instant::now(), self.client.complete(&messages))
            .await
            .map_err(TurnError::FeedbackFailed)?;

        self.append(Role::User, directive);
        self.append(Role::Assistant, revised.clone());
        Ok(Some(revised))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::scripted::{fail, ok, ScriptedClient};
    use crate::refine::phases::build_system_instruction;
    use crate::refine::progress::tests::RecordingSink;
    use crate::refine::Phase;
    use std::time::Duration;

    fn session(client: Arc<ScriptedClient>) -> Session {
        let refine = RefineConfig {
            thinking_secs: 0,
            validation_secs: 0,
            ..RefineConfig::default()
        };
        Session::new(
            client,
            ProgressReporter::new(Arc::new(RecordingSink::default()), Duration::from_millis(100)),
            &refine,
            build_system_instruction("You write SQL.", ""),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_appends_request_and_single_answer() {
        let client = Arc::new(ScriptedClient::new(vec![
            ok("reasoning"),
            ok("SELECT * FROM customers;"),
            ok("SELECT id, name FROM customers;"),
        ]));
        let mut session = session(client);

        let answer = session.run_turn("list all customers").await.unwrap();

        assert_eq!(answer, "SELECT id, name FROM customers;");
        assert_eq!(
            session.snapshot(),
            vec![
                ChatMessage::user("list all customers"),
                ChatMessage::assistant("SELECT id, name FROM customers;"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_turn_leaves_history_unchanged() {
        let client = Arc::new(
            ScriptedClient::new(vec![ok("r"), ok("d"), ok("v")]).with_fallback(fail()),
        );
        let mut session = session(client.clone());
        session.run_turn("first").await.unwrap();
        let before = session.snapshot();

        let err = session.run_turn("second").await.unwrap_err();

        assert!(matches!(
            err,
            TurnError::PhaseAborted {
                phase: Phase::Thinking
            }
        ));
        assert_eq!(session.snapshot(), before);
        assert_eq!(client.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_is_prefix_extended_across_turns() {
        let client = Arc::new(ScriptedClient::always("answer"));
        let mut session = session(client);

        let mut previous = session.snapshot();
        for request in ["a", "b", "c"] {
            session.run_turn(request).await.unwrap();
            let current = session.snapshot();
            assert!(current.len() > previous.len());
            assert_eq!(&current[..previous.len()], previous.as_slice());
            previous = current;
        }
        assert_eq!(previous.len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_feedback_makes_no_call() {
        let client = Arc::new(ScriptedClient::always("answer"));
        let mut session = session(client.clone());
        session.run_turn("list all customers").await.unwrap();
        let calls_before = client.call_count();
        let before = session.snapshot();

        assert_eq!(session.feedback_turn("   ").await.unwrap(), None);
        assert_eq!(session.feedback_turn("").await.unwrap(), None);

        assert_eq!(client.call_count(), calls_before);
        assert_eq!(session.snapshot(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feedback_appends_one_exchange_with_fresh_answer() {
        let client = Arc::new(ScriptedClient::new(vec![
            ok("reasoning"),
            ok("SELECT * FROM a JOIN b;"),
            ok("SELECT * FROM a JOIN b ON a.id = b.a_id;"),
            ok("SELECT * FROM a LEFT JOIN b ON a.id = b.a_id;"),
        ]));
        let mut session = session(client.clone());
        session.run_turn("join a and b").await.unwrap();
        let before = session.snapshot();

        let revised = session
            .feedback_turn("use LEFT JOIN instead")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(revised, "SELECT * FROM a LEFT JOIN b ON a.id = b.a_id;");
        let after = session.snapshot();
        assert_eq!(after.len(), before.len() + 2);
        assert_eq!(&after[..before.len()], before.as_slice());
        assert_eq!(after[before.len()].role, Role::User);
        assert!(after[before.len()].content.contains("use LEFT JOIN instead"));
        assert_eq!(after[before.len() + 1], ChatMessage::assistant(revised.clone()));

        // One plain call: system + history + feedback turn
        let last_call = client.calls().pop().unwrap();
        assert_eq!(last_call.len(), before.len() + 2);
        assert_eq!(last_call[0], build_system_instruction("You write SQL.", ""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_feedback_commits_nothing() {
        let client = Arc::new(
            ScriptedClient::new(vec![ok("r"), ok("d"), ok("v")]).with_fallback(fail()),
        );
        let mut session = session(client);
        session.run_turn("q").await.unwrap();
        let before = session.snapshot();

        let err = session.feedback_turn("shorter please").await.unwrap_err();

        assert!(matches!(err, TurnError::FeedbackFailed(_)));
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_last_answer_skips_user_turns() {
        let mut history = History::new();
        assert!(history.last_answer().is_none());
        history.append(Role::User, "q1");
        history.append(Role::Assistant, "a1");
        history.append(Role::User, "q2");
        assert_eq!(history.last_answer(), Some("a1"));
    }
}
