// Interactive REPL: one request per line, then an optional feedback sub-loop

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use super::format::{format_answer, is_exit_command};
use crate::refine::Session;

const PROMPT: &str = "You: ";
const FEEDBACK_PROMPT: &str = "Feedback (enter to continue): ";

#[derive(Debug)]
enum Input {
    Line(String),
    /// Ctrl-C or Ctrl-D at a prompt
    Quit,
}

/// Where prompt answers come from
trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<Input>;
}

impl LineSource for DefaultEditor {
    fn read_line(&mut self, prompt: &str) -> Result<Input> {
        match self.readline(prompt) {
            Ok(line) => Ok(Input::Line(line)),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(Input::Quit),
            Err(e) => Err(e).context("Failed to read input"),
        }
    }
}

pub struct Repl {
    session: Session,
    editor: DefaultEditor,
}

impl Repl {
    pub fn new(session: Session) -> Result<Self> {
        let editor = DefaultEditor::new().context("Failed to initialise line editor")?;
        Ok(Self { session, editor })
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("{}", "simmer: think, draft, validate".bold());
        println!("Type your request below (type 'exit' to quit).");

        loop {
            let input = match self.editor.read_line(PROMPT)? {
                Input::Line(line) => line,
                Input::Quit => break,
            };
            let input = input.trim();

            if input.is_empty() {
                continue;
            }
            if is_exit_command(input) {
                break;
            }
            let _ = self.editor.add_history_entry(input);

            match self.session.run_turn(input).await {
                Ok(answer) => {
                    print_answer(&answer);
                    if !feedback_loop(&mut self.session, &mut self.editor).await? {
                        break;
                    }
                }
                Err(e) => {
                    eprintln!("{} {}", "✗".red().bold(), e.to_string().red());
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }
}

/// Regenerate the last answer until blank feedback or a failed call.
/// Returns `false` when the user quit from the feedback prompt.
async fn feedback_loop(session: &mut Session, input: &mut impl LineSource) -> Result<bool> {
    loop {
        let feedback = match input.read_line(FEEDBACK_PROMPT)? {
            Input::Line(line) => line,
            Input::Quit => return Ok(false),
        };
        if is_exit_command(&feedback) {
            return Ok(false);
        }

        match session.feedback_turn(&feedback).await {
            Ok(Some(revised)) => print_answer(&revised),
            Ok(None) => return Ok(true),
            Err(e) => {
                eprintln!("{} {}", "✗".red().bold(), e.to_string().red());
                return Ok(true);
            }
        }
    }
}

fn print_answer(answer: &str) {
    println!("\n{}", "Answer:".green().bold());
    println!("{}\n", format_answer(answer));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::scripted::{fail, ok, ScriptedClient};
    use crate::completion::Role;
    use crate::config::RefineConfig;
    use crate::refine::progress::tests::RecordingSink;
    use crate::refine::{build_system_instruction, ProgressReporter};
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    /// Canned prompt answers; running out behaves like Ctrl-D
    struct ScriptedInput {
        lines: VecDeque<Input>,
        prompts: usize,
    }

    impl ScriptedInput {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|l| Input::Line(l.to_string())).collect(),
                prompts: 0,
            }
        }
    }

    impl LineSource for ScriptedInput {
        fn read_line(&mut self, _prompt: &str) -> Result<Input> {
            self.prompts += 1;
            Ok(self.lines.pop_front().unwrap_or(Input::Quit))
        }
    }

    async fn answered_session(client: Arc<ScriptedClient>) -> Session {
        let refine = RefineConfig {
            thinking_secs: 0,
            validation_secs: 0,
            ..RefineConfig::default()
        };
        let mut session = Session::new(
            client,
            ProgressReporter::new(Arc::new(RecordingSink::default()), Duration::from_millis(100)),
            &refine,
            build_system_instruction("You write SQL.", ""),
        );
        session.run_turn("orders with customers").await.unwrap();
        session
    }

    fn turn_replies() -> Vec<Result<String, crate::completion::CompletionError>> {
        vec![ok("reasoning"), ok("draft"), ok("SELECT * FROM orders;")]
    }

    #[tokio::test(start_paused = true)]
    async fn test_feedback_repeats_until_blank_line() {
        let mut replies = turn_replies();
        replies.push(ok("SELECT * FROM orders LEFT JOIN customers;"));
        replies.push(ok("SELECT * FROM orders LEFT JOIN customers ORDER BY id;"));
        let client = Arc::new(ScriptedClient::new(replies));
        let mut session = answered_session(client.clone()).await;
        let mut input = ScriptedInput::new(&["use LEFT JOIN", "order by id", "  ", "unread"]);

        let keep_going = feedback_loop(&mut session, &mut input).await.unwrap();

        assert!(keep_going);
        assert_eq!(input.prompts, 3);
        assert_eq!(client.call_count(), 5);
        let history = session.snapshot();
        assert_eq!(history.len(), 6);
        assert_eq!(history[5].role, Role::Assistant);
        assert_eq!(
            history[5].content,
            "SELECT * FROM orders LEFT JOIN customers ORDER BY id;"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_revision_ends_feedback_without_mutation() {
        let mut replies = turn_replies();
        replies.push(fail());
        let client = Arc::new(ScriptedClient::new(replies));
        let mut session = answered_session(client.clone()).await;
        let before = session.snapshot();
        let mut input = ScriptedInput::new(&["use LEFT JOIN", "never asked"]);

        let keep_going = feedback_loop(&mut session, &mut input).await.unwrap();

        assert!(keep_going);
        assert_eq!(input.prompts, 1);
        assert_eq!(session.snapshot(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_or_eof_at_feedback_quits_session() {
        let client = Arc::new(ScriptedClient::new(turn_replies()));
        let mut session = answered_session(client.clone()).await;

        let mut exit = ScriptedInput::new(&["EXIT"]);
        assert!(!feedback_loop(&mut session, &mut exit).await.unwrap());

        let mut eof = ScriptedInput::new(&[]);
        assert!(!feedback_loop(&mut session, &mut eof).await.unwrap());

        assert_eq!(client.call_count(), 3);
        assert_eq!(session.snapshot().len(), 2);
    }
}
