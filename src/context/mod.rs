// Context assembly for the system prompt
//
// This module collects user-named files (schemas, docs, code) whose text is
// folded into the system instruction of every completion call.

pub mod files;
pub use files::collect_context;
