// Loading of user-named context files (schemas, docs, sample code) into the system prompt
//
// Each configured path is either a file, read as-is, or a directory, walked in
// sorted order for text files with a known extension. Every source becomes a
// `### <path>` section. Unreadable sources are skipped with a warning; this
// never fails.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Extensions picked up when walking a directory.
const TEXT_EXTENSIONS: &[&str] = &[
    "md", "txt", "sql", "rs", "py", "toml", "json", "yaml", "yml", "csv",
];

const TRUNCATION_MARKER: &str = "\n[... truncated ...]";

/// Collect the text of every context source, or an empty string if there is none.
pub fn collect_context(paths: &[PathBuf], max_file_bytes: usize) -> String {
    let mut sections: Vec<String> = Vec::new();

    for path in paths {
        if path.is_dir() {
            for file in text_files_in(path) {
                if let Some(section) = read_section(&file, max_file_bytes) {
                    sections.push(section);
                }
            }
        } else if let Some(section) = read_section(path, max_file_bytes) {
            sections.push(section);
        }
    }

    if sections.is_empty() {
        debug!("No context collected from {} path(s)", paths.len());
        return String::new();
    }

    info!("Loaded {} context file(s) into system prompt", sections.len());
    sections.join("\n\n")
}

fn text_files_in(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable context entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && has_text_extension(e.path()))
        .map(|e| e.into_path())
        .collect()
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn has_text_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read one file as a `### path` section; `None` if missing, unreadable or blank
fn read_section(path: &Path, max_bytes: usize) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => {
            debug!("Loaded context file: {}", path.display());
            Some(format!(
                "### {}\n{}",
                path.display(),
                truncate_to_bytes(content.trim_end(), max_bytes)
            ))
        }
        Ok(_) => None,
        Err(e) => {
            warn!("Failed to read context file {}: {}", path.display(), e);
            None
        }
    }
}

/// Cut `text` to at most `max_bytes` on a char boundary, marking the cut
fn truncate_to_bytes(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &text[..end], TRUNCATION_MARKER)
}
