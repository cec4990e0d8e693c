// Project-wide constants
//
// Centralised here so endpoint paths and timing defaults have one source of
// truth. Import via `use crate::config::constants::*;`.

/// Per-user directory under $HOME holding config.toml and server.log.
pub const CONFIG_DIR_NAME: &str = ".simmer";

/// Config file name inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default llama.cpp server address.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

/// OpenAI-compatible chat completion route.
pub const DEFAULT_CHAT_PATH: &str = "/v1/chat/completions";

/// llama.cpp health route; answers 503 while the model is still loading.
pub const HEALTH_PATH: &str = "/health";

/// Sampling temperature sent with every completion request.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Local models on CPU can take minutes for a long answer.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Minimum wall-clock duration of the Thinking phase.
pub const DEFAULT_THINKING_SECS: u64 = 30;

/// Minimum wall-clock duration of the Validation phase.
pub const DEFAULT_VALIDATION_SECS: u64 = 30;

/// Status line redraw interval.
pub const DEFAULT_TICK_MS: u64 = 100;

/// Pause after a failed refinement iteration before the next one.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Default inference server executable.
pub const DEFAULT_SERVER_BINARY: &str = "llama-server";

/// How long a freshly spawned server gets to report healthy.
pub const DEFAULT_SERVER_STARTUP_SECS: u64 = 120;

/// Per-file cap when folding context files into the system instruction.
pub const DEFAULT_MAX_CONTEXT_FILE_BYTES: usize = 64 * 1024;

/// Role text of the system instruction.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert software engineer and SQL developer. \
Answer precisely and completely. When asked for code or queries, produce correct, \
idiomatic, runnable output.";
