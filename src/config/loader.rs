// Configuration loader
// Loads ~/.simmer/config.toml, then applies environment and command-line overrides

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::constants::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use super::settings::Config;

/// Values given on the command line; `None` leaves the loaded value alone
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub model_path: Option<PathBuf>,
    pub no_server: bool,
    pub context_paths: Vec<PathBuf>,
    pub thinking_secs: Option<u64>,
    pub validation_secs: Option<u64>,
    pub temperature: Option<f32>,
}

/// Per-user directory (~/.simmer)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Load configuration with precedence CLI > env > file > defaults
pub fn load_config(explicit_path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Config> {
    let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

    let (path, required) = match explicit_path {
        Some(path) => (Some(path.to_path_buf()), true),
        None => match env("SIMMER_CONFIG") {
            Some(path) => (Some(PathBuf::from(path)), true),
            None => (
                config_dir().ok().map(|dir| dir.join(CONFIG_FILE_NAME)),
                false,
            ),
        },
    };

    let mut config = match path {
        Some(path) if path.exists() => load_from_file(&path)?,
        Some(path) if required => {
            bail!("Configuration file not found: {}", path.display())
        }
        _ => {
            tracing::debug!("No config file found, using defaults");
            Config::default()
        }
    };

    apply_env(&mut config, env);
    apply_overrides(&mut config, overrides);

    config
        .validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

/// Parse a TOML config file; missing sections and fields take defaults
pub fn load_from_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    tracing::info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

fn apply_env(config: &mut Config, env: impl Fn(&str) -> Option<String>) {
    if let Some(endpoint) = env("SIMMER_ENDPOINT") {
        config.endpoint.base_url = endpoint;
    }
    if let Some(model_path) = env("SIMMER_MODEL_PATH") {
        config.server.model_path = Some(PathBuf::from(model_path));
    }
}

fn apply_overrides(config: &mut Config, overrides: &ConfigOverrides) {
    if let Some(endpoint) = &overrides.endpoint {
        config.endpoint.base_url = endpoint.clone();
    }
    if let Some(model_path) = &overrides.model_path {
        config.server.model_path = Some(model_path.clone());
    }
    if overrides.no_server {
        config.server.auto_start = false;
    }
    if !overrides.context_paths.is_empty() {
        config.context.paths.extend(overrides.context_paths.iter().cloned());
    }
    if let Some(secs) = overrides.thinking_secs {
        config.refine.thinking_secs = secs;
    }
    if let Some(secs) = overrides.validation_secs {
        config.refine.validation_secs = secs;
    }
    if let Some(temperature) = overrides.temperature {
        config.endpoint.temperature = temperature;
    }
}
