// Timed multi-phase refinement
//
// One user request becomes a bounded sequence of completion calls:
// Thinking (time-boxed) → Drafting (single-shot) → Validation (time-boxed),
// each phase seeded with the previous phase's output. A status line shows
// elapsed time while every call is in flight.

use thiserror::Error;

use crate::completion::CompletionError;

pub mod phases;
pub mod progress;
pub mod session;
pub mod timed_loop;

pub use phases::{build_system_instruction, Phase, PhaseController};
pub use progress::{ProgressHandle, ProgressReporter, ProgressSink, TerminalSink};
pub use session::{History, Session};
pub use timed_loop::TimedLoop;

/// Why a session turn committed nothing
#[derive(Debug, Error)]
pub enum TurnError {
    /// Thinking or Drafting never produced a single successful completion
    #[error("{phase} phase produced no output; turn aborted")]
    PhaseAborted { phase: Phase },

    /// The single regeneration call of the feedback sub-loop failed
    #[error("could not regenerate answer: {0}")]
    FeedbackFailed(#[source] CompletionError),
}
