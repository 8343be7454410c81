//! Configuration types for the Vocalis orchestrator

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::inference::{CFG_WEIGHT_RANGE, EXAGGERATION_RANGE, TEMPERATURE_RANGE};

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum characters per chunk for buffered synthesis
    #[serde(default = "default_max_chunk_length")]
    pub max_chunk_length: usize,

    /// Maximum characters accepted in a single request
    #[serde(default = "default_max_total_length")]
    pub max_total_length: usize,

    /// Default emotion intensity
    #[serde(default = "default_exaggeration")]
    pub exaggeration: f32,

    /// Default pace control (classifier-free guidance weight)
    #[serde(default = "default_cfg_weight")]
    pub cfg_weight: f32,

    /// Default sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Voice sample used when a request does not upload one
    #[serde(default = "default_voice_sample_path")]
    pub voice_sample_path: PathBuf,

    /// Run the cleanup hook every N requests
    #[serde(default = "default_memory_cleanup_interval")]
    pub memory_cleanup_interval: u64,

    /// Sample process memory before and after each request
    #[serde(default = "default_enable_memory_monitoring")]
    pub enable_memory_monitoring: bool,

    /// Silence inserted between chunk waveforms in buffered output
    #[serde(default = "default_inter_chunk_silence_ms")]
    pub inter_chunk_silence_ms: u32,

    /// Inference device passed to the engine ("auto", "cpu", "cuda", "mps")
    #[serde(default = "default_device")]
    pub device: String,

    /// Interpreter used to run the inference script
    #[serde(default = "default_python_cmd")]
    pub python_cmd: String,

    /// Inference script speaking the JSON stdin/stdout protocol
    #[serde(default = "default_script_path")]
    pub script_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_chunk_length: default_max_chunk_length(),
            max_total_length: default_max_total_length(),
            exaggeration: default_exaggeration(),
            cfg_weight: default_cfg_weight(),
            temperature: default_temperature(),
            voice_sample_path: default_voice_sample_path(),
            memory_cleanup_interval: default_memory_cleanup_interval(),
            enable_memory_monitoring: default_enable_memory_monitoring(),
            inter_chunk_silence_ms: default_inter_chunk_silence_ms(),
            device: default_device(),
            python_cmd: default_python_cmd(),
            script_path: default_script_path(),
        }
    }
}

impl EngineConfig {
    /// Check parameter defaults and limits
    pub fn validate(&self) -> Result<()> {
        if !EXAGGERATION_RANGE.contains(&self.exaggeration) {
            return Err(Error::ConfigError(format!(
                "exaggeration must be between 0.25 and 2.0, got {}",
                self.exaggeration
            )));
        }
        if !CFG_WEIGHT_RANGE.contains(&self.cfg_weight) {
            return Err(Error::ConfigError(format!(
                "cfg_weight must be between 0.0 and 1.0, got {}",
                self.cfg_weight
            )));
        }
        if !TEMPERATURE_RANGE.contains(&self.temperature) {
            return Err(Error::ConfigError(format!(
                "temperature must be between 0.05 and 5.0, got {}",
                self.temperature
            )));
        }
        if self.max_chunk_length == 0 {
            return Err(Error::ConfigError(
                "max_chunk_length must be positive".to_string(),
            ));
        }
        if self.max_total_length == 0 {
            return Err(Error::ConfigError(
                "max_total_length must be positive".to_string(),
            ));
        }
        if self.memory_cleanup_interval == 0 {
            return Err(Error::ConfigError(
                "memory_cleanup_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_max_chunk_length() -> usize {
    280
}

fn default_max_total_length() -> usize {
    3000
}

fn default_exaggeration() -> f32 {
    0.5
}

fn default_cfg_weight() -> f32 {
    0.5
}

fn default_temperature() -> f32 {
    0.8
}

fn default_voice_sample_path() -> PathBuf {
    PathBuf::from("./voice-sample.mp3")
}

fn default_memory_cleanup_interval() -> u64 {
    5
}

fn default_enable_memory_monitoring() -> bool {
    true
}

fn default_inter_chunk_silence_ms() -> u32 {
    100
}

fn default_device() -> String {
    "auto".to_string()
}

fn default_python_cmd() -> String {
    "python3".to_string()
}

fn default_script_path() -> PathBuf {
    std::env::current_dir()
        .map(|p| p.join("scripts/tts_inference.py"))
        .unwrap_or_else(|_| PathBuf::from("scripts/tts_inference.py"))
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// "*" or a comma-separated origin list
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl ServerConfig {
    /// Parsed origin list; empty means any origin
    pub fn allowed_origins(&self) -> Vec<String> {
        if self.cors_origins.trim() == "*" {
            return Vec::new();
        }
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4123
}

fn default_cors_origins() -> String {
    "*".to_string()
}
