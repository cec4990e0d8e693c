// Configuration structs

use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::constants::*;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Role text of the system instruction (context is appended after it)
    pub system_prompt: String,

    /// Completion endpoint settings
    pub endpoint: EndpointConfig,

    /// Phase timing
    pub refine: RefineConfig,

    /// Local inference server bootstrap
    pub server: ServerConfig,

    /// Files folded into the system instruction
    pub context: ContextConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            endpoint: EndpointConfig::default(),
            refine: RefineConfig::default(),
            server: ServerConfig::default(),
            context: ContextConfig::default(),
        }
    }
}

/// Where and how completion requests are sent
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Scheme, host and port of the server (e.g. "http://127.0.0.1:8080")
    pub base_url: String,
    /// Chat completion route appended to `base_url`
    pub chat_path: String,
    /// Model name; llama.cpp ignores it, hosted OpenAI-compatible servers need it
    pub model: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_path: DEFAULT_CHAT_PATH.to_string(),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl EndpointConfig {
    pub fn chat_url(&self) -> String {
        join_url(&self.base_url, &self.chat_path)
    }

    pub fn health_url(&self) -> String {
        join_url(&self.base_url, HEALTH_PATH)
    }

    /// Host and port a locally spawned server should bind to
    pub fn host_port(&self) -> Result<(String, u16)> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid endpoint URL: {}", self.base_url))?;
        let host = url
            .host_str()
            .with_context(|| format!("Endpoint URL has no host: {}", self.base_url))?
            .to_string();
        let port = url
            .port_or_known_default()
            .with_context(|| format!("Endpoint URL has no port: {}", self.base_url))?;
        Ok((host, port))
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Minimum durations and pacing of the refinement phases
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    pub thinking_secs: u64,
    pub validation_secs: u64,
    pub tick_ms: u64,
    pub retry_delay_ms: u64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            thinking_secs: DEFAULT_THINKING_SECS,
            validation_secs: DEFAULT_VALIDATION_SECS,
            tick_ms: DEFAULT_TICK_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl RefineConfig {
    pub fn thinking(&self) -> Duration {
        Duration::from_secs(self.thinking_secs)
    }

    pub fn validation(&self) -> Duration {
        Duration::from_secs(self.validation_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Local inference server bootstrap
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Spawn `binary` when nothing answers on the endpoint
    pub auto_start: bool,
    pub binary: String,
    /// GGUF model passed as `-m`; auto-start is skipped without it
    pub model_path: Option<PathBuf>,
    pub extra_args: Vec<String>,
    pub startup_timeout_secs: u64,
    /// Server stdout/stderr; defaults to ~/.simmer/server.log
    pub log_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            binary: DEFAULT_SERVER_BINARY.to_string(),
            model_path: None,
            extra_args: Vec::new(),
            startup_timeout_secs: DEFAULT_SERVER_STARTUP_SECS,
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Files or directories whose text is folded into the system instruction
    pub paths: Vec<PathBuf>,
    pub max_file_bytes: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            max_file_bytes: DEFAULT_MAX_CONTEXT_FILE_BYTES,
        }
    }
}

impl Config {
    /// Validate configuration and return helpful errors
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint.base_url)
            .with_context(|| format!("Invalid endpoint.base_url: {}", self.endpoint.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!(
                "endpoint.base_url must use http or https, got '{}'",
                url.scheme()
            );
        }

        if !(0.0..=2.0).contains(&self.endpoint.temperature) {
            bail!(
                "endpoint.temperature must be between 0.0 and 2.0, got {}",
                self.endpoint.temperature
            );
        }

        if self.refine.tick_ms == 0 {
            bail!("refine.tick_ms must be greater than 0");
        }

        Ok(())
    }
}
