// CLI module
// Public interface for the interactive command-line interface

mod format;
mod repl;

pub use format::{format_answer, is_exit_command};
pub use repl::Repl;
