// Configuration module
// Public interface for configuration loading

pub mod constants;
mod loader;
mod settings;

pub use loader::{config_dir, load_config, load_from_file, ConfigOverrides};
pub use settings::{Config, ContextConfig, EndpointConfig, RefineConfig, ServerConfig};
