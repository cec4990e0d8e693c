// Terminal presentation of answers
//
// Pure text → text; the refinement core never calls this.

use crossterm::style::Stylize;

/// Colour an answer for the terminal: fenced code in cyan, fences dimmed,
/// markdown headings bold. Everything else passes through unchanged.
pub fn format_answer(text: &str) -> String {
    let mut in_code = false;
    let mut out: Vec<String> = Vec::new();

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_code = !in_code;
            out.push(line.dark_grey().to_string());
        } else if in_code {
            out.push(line.cyan().to_string());
        } else if line.starts_with('#') {
            out.push(line.bold().to_string());
        } else {
            out.push(line.to_string());
        }
    }

    out.join("\n")
}

/// `exit` in any case ends the session
pub fn is_exit_command(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("exit")
}
