//! Vocalis Core - orchestration for chunked text-to-speech synthesis
//!
//! This crate turns arbitrary-length text into audio by delegating per-chunk
//! synthesis to an external inference engine and reassembling the results.
//!
//! # Architecture
//!
//! - [`text`]: deterministic segmentation into length-bounded chunks
//! - [`inference`]: the adapter contract and a subprocess-backed bridge
//! - [`audio`]: waveform assembly and WAV/PCM encoding
//! - [`streaming`]: raw-audio and server-sent-event wire encoders
//! - [`status`]: the process-wide request lifecycle tracker
//! - [`synthesis`]: the orchestrator tying the pieces together
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vocalis_core::{EngineConfig, PythonBridge, SpeechSynthesizer, StatusManager};
//!
//! let config = EngineConfig::default();
//! let bridge = Arc::new(PythonBridge::from_config(&config));
//! bridge.initialize(&config.voice_sample_path)?;
//!
//! let synth = SpeechSynthesizer::new(bridge, Arc::new(StatusManager::new()), config);
//! let params = synth.resolve_parameters(Default::default(), None)?;
//! let wav = synth.synthesize("Hello, world!", params).await?;
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod inference;
pub mod memory;
pub mod status;
pub mod streaming;
pub mod synthesis;
pub mod text;

pub use audio::{AudioEncoder, AudioFormat, Waveform};
pub use config::{EngineConfig, ServerConfig};
pub use error::{Error, Result};
pub use inference::{
    EngineReadiness, GenerationParameters, InferenceAdapter, InitializationState,
    ParameterOverrides, PythonBridge, VoiceReference,
};
pub use memory::MemorySample;
pub use status::{RequestState, StatusManager, StatusSnapshot, StatusUpdate};
pub use streaming::{StreamEncoder, StreamEvent, StreamFormat, Usage};
pub use synthesis::{SpeechStream, SpeechSynthesizer};
pub use text::{split, ChunkStrategy, StreamingQuality, StreamingSettings};
