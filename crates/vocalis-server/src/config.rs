//! Configuration loading
//!
//! Sources are merged from lowest to highest priority:
//! 1. Built-in defaults
//! 2. `vocalis.toml` / `vocalis.local.toml` in the working directory
//! 3. Environment variables (`VOCALIS_` prefix, `__` between levels)

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use vocalis_core::{EngineConfig, ServerConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

const CONFIG_FILE_NAMES: &[&str] = &["vocalis", "vocalis.local"];

/// Load configuration from the default search path.
///
/// # Environment examples
/// - `VOCALIS_SERVER__PORT=5123`
/// - `VOCALIS_ENGINE__MAX_CHUNK_LENGTH=200`
/// - `VOCALIS_ENGINE__VOICE_SAMPLE_PATH=/voices/sample.wav`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// Load configuration, reading `config_path` instead of the default files when given
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 4123)?;

    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("VOCALIS")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let app_config: AppConfig = builder.build()?.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;
    Ok(app_config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }
    config
        .engine
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))
}

/// Log the effective configuration at startup
pub fn print_config(config: &AppConfig) {
    info!("=== Vocalis Configuration ===");
    info!("Server: {}:{}", config.server.host, config.server.port);
    info!("CORS origins: {}", config.server.cors_origins);
    info!("Voice sample: {}", config.engine.voice_sample_path.display());
    info!("Device: {}", config.engine.device);
    info!(
        "Chunking: max {} chars per chunk, {} per request",
        config.engine.max_chunk_length, config.engine.max_total_length
    );
    info!(
        "Defaults: exaggeration {}, cfg_weight {}, temperature {}",
        config.engine.exaggeration, config.engine.cfg_weight, config.engine.temperature
    );
    info!(
        "Memory: monitoring {}, cleanup every {} requests",
        config.engine.enable_memory_monitoring, config.engine.memory_cleanup_interval
    );
    info!("=============================");
}
