//! Contract between the orchestrator and the neural inference engine

use serde::Serialize;
use std::ops::RangeInclusive;
use std::path::PathBuf;

use crate::audio::Waveform;
use crate::config::EngineConfig;
use crate::error::{Error, Result};

pub const EXAGGERATION_RANGE: RangeInclusive<f32> = 0.25..=2.0;
pub const CFG_WEIGHT_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.05..=5.0;

/// Where the reference voice for a request comes from
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoiceReference {
    pub path: PathBuf,
    /// Human-readable origin, e.g. "configured sample" or "uploaded file"
    pub source: String,
}

impl VoiceReference {
    pub fn configured(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source: "configured sample".to_string(),
        }
    }

    pub fn uploaded(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source: "uploaded file".to_string(),
        }
    }
}

/// Optional per-request overrides of the engine defaults
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterOverrides {
    pub exaggeration: Option<f32>,
    pub cfg_weight: Option<f32>,
    pub temperature: Option<f32>,
}

/// Fully resolved generation parameters, immutable for the lifetime of a request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerationParameters {
    /// Emotion intensity
    pub exaggeration: f32,
    /// Pace control
    pub cfg_weight: f32,
    /// Sampling randomness
    pub temperature: f32,
    #[serde(skip)]
    pub voice: VoiceReference,
}

impl GenerationParameters {
    /// Fill missing overrides from the engine defaults and range-check the result.
    pub fn resolve(
        overrides: ParameterOverrides,
        voice: VoiceReference,
        defaults: &EngineConfig,
    ) -> Result<Self> {
        let params = Self {
            exaggeration: overrides.exaggeration.unwrap_or(defaults.exaggeration),
            cfg_weight: overrides.cfg_weight.unwrap_or(defaults.cfg_weight),
            temperature: overrides.temperature.unwrap_or(defaults.temperature),
            voice,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        check_range("exaggeration", self.exaggeration, &EXAGGERATION_RANGE)?;
        check_range("cfg_weight", self.cfg_weight, &CFG_WEIGHT_RANGE)?;
        check_range("temperature", self.temperature, &TEMPERATURE_RANGE)
    }
}

fn check_range(name: &str, value: f32, range: &RangeInclusive<f32>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{} must be between {} and {}, got {}",
            name,
            range.start(),
            range.end(),
            value
        )))
    }
}

/// Engine initialization lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializationState {
    NotStarted,
    Initializing,
    Ready,
    Error,
}

/// Snapshot of engine readiness for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct EngineReadiness {
    pub state: InitializationState,
    pub progress: String,
    pub error: Option<String>,
    pub device: Option<String>,
}

impl EngineReadiness {
    pub fn ready(device: impl Into<String>) -> Self {
        Self {
            state: InitializationState::Ready,
            progress: "Model ready".to_string(),
            error: None,
            device: Some(device.into()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == InitializationState::Ready
    }
}

/// The external synthesis capability.
///
/// `generate` is synchronous and may block for seconds; callers run it on a
/// blocking worker. Implementations return host-memory samples at a fixed
/// sample rate per loaded engine instance.
pub trait InferenceAdapter: Send + Sync + 'static {
    fn generate(&self, text: &str, params: &GenerationParameters) -> Result<Waveform>;

    fn sample_rate(&self) -> u32;

    /// Interleaved channel count of every waveform `generate` returns
    fn channels(&self) -> u16 {
        1
    }

    fn readiness(&self) -> EngineReadiness;

    fn is_ready(&self) -> bool {
        self.readiness().is_ready()
    }
}
