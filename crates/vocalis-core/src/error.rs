//! Error types for the Vocalis orchestration core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Rejected before chunking or inference; leaves no status record behind.
    #[error("{0}")]
    Validation(String),

    #[error("Model not loaded: {0}")]
    EngineUnavailable(String),

    /// An inference call failed part-way through a request.
    #[error("TTS generation failed: {0}")]
    Generation(String),

    #[error("Audio encoding error: {0}")]
    AudioError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl Error {
    /// Stable error kind reported alongside the message in structured error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "invalid_request_error",
            Error::EngineUnavailable(_) => "model_error",
            Error::Generation(_) => "generation_error",
            Error::AudioError(_) => "audio_error",
            Error::ConfigError(_) => "config_error",
            Error::IoError(_) | Error::SerializationError(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
