//! Python bridge for neural TTS inference
//! Runs the inference script as a subprocess and exchanges JSON over stdin/stdout

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::audio::Waveform;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::inference::adapter::{
    EngineReadiness, GenerationParameters, InferenceAdapter, InitializationState,
};

const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// Request to the Python inference script
#[derive(Debug, Serialize)]
pub struct PythonTTSRequest {
    pub command: String,
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_prompt_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exaggeration: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfg_weight: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Response from the Python inference script
#[derive(Debug, Deserialize)]
pub struct PythonTTSResponse {
    pub audio_base64: Option<String>,
    pub sample_rate: Option<u32>,
    pub device: Option<String>,
    pub error: Option<String>,
    pub status: Option<String>,
}

/// Subprocess-backed inference adapter.
///
/// The device is fixed at construction; "auto" is resolved by the script
/// during [`PythonBridge::initialize`].
pub struct PythonBridge {
    script_path: PathBuf,
    python_cmd: String,
    device: String,
    sample_rate: AtomicU32,
    readiness: RwLock<EngineReadiness>,
}

impl PythonBridge {
    /// Create a new Python bridge
    pub fn new(
        script_path: impl Into<PathBuf>,
        python_cmd: impl Into<String>,
        device: impl Into<String>,
    ) -> Self {
        Self {
            script_path: script_path.into(),
            python_cmd: python_cmd.into(),
            device: device.into(),
            sample_rate: AtomicU32::new(DEFAULT_SAMPLE_RATE),
            readiness: RwLock::new(EngineReadiness {
                state: InitializationState::NotStarted,
                progress: String::new(),
                error: None,
                device: None,
            }),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.script_path.clone(),
            config.python_cmd.clone(),
            config.device.clone(),
        )
    }

    /// Load the model and probe its sample rate. Blocks until the script answers.
    pub fn initialize(&self, voice_sample_path: &Path) -> Result<()> {
        self.set_progress(InitializationState::Initializing, "Checking voice sample...");

        if !voice_sample_path.exists() {
            let message = format!("Voice sample not found: {}", voice_sample_path.display());
            self.fail(&message);
            return Err(Error::EngineUnavailable(message));
        }

        self.set_progress(
            InitializationState::Initializing,
            "Loading TTS model (this may take a while)...",
        );
        info!(
            "Initializing TTS engine via {} (device: {})",
            self.script_path.display(),
            self.device
        );

        let request = PythonTTSRequest {
            command: "load".to_string(),
            device: self.device.clone(),
            text: None,
            audio_prompt_path: None,
            exaggeration: None,
            cfg_weight: None,
            temperature: None,
        };

        let response = match self.call_python(&request) {
            Ok(response) => response,
            Err(e) => {
                self.fail(&e.to_string());
                return Err(Error::EngineUnavailable(e.to_string()));
            }
        };

        if let Some(err) = response.error {
            self.fail(&err);
            return Err(Error::EngineUnavailable(err));
        }

        if let Some(rate) = response.sample_rate {
            self.sample_rate.store(rate, Ordering::Relaxed);
        }
        let device = response.device.unwrap_or_else(|| self.device.clone());
        info!(
            "Model initialized on {} at {} Hz",
            device,
            self.sample_rate.load(Ordering::Relaxed)
        );

        *self
            .readiness
            .write()
            .unwrap_or_else(PoisonError::into_inner) = EngineReadiness::ready(device);
        Ok(())
    }

    fn set_progress(&self, state: InitializationState, progress: &str) {
        let mut readiness = self
            .readiness
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        readiness.state = state;
        readiness.progress = progress.to_string();
    }

    fn fail(&self, message: &str) {
        warn!("Failed to initialize model: {}", message);
        let mut readiness = self
            .readiness
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        readiness.state = InitializationState::Error;
        readiness.progress = format!("Failed: {}", message);
        readiness.error = Some(message.to_string());
    }

    /// Call Python script with JSON request
    fn call_python(&self, request: &PythonTTSRequest) -> Result<PythonTTSResponse> {
        let request_json = serde_json::to_string(request)?;

        let mut child = Command::new(&self.python_cmd)
            .arg(&self.script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Generation(format!("Failed to start Python: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(request_json.as_bytes())
                .map_err(|e| Error::Generation(format!("Failed to write to Python: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Generation(format!("Python process failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Generation(format!("Python error: {}", stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);

        // Model loaders print progress lines to stdout; the response is the JSON line
        let json_str = stdout
            .lines()
            .find(|line| line.trim().starts_with('{'))
            .unwrap_or(&stdout);

        serde_json::from_str(json_str).map_err(|e| {
            Error::Generation(format!(
                "Failed to parse Python response: {} - {}",
                e, json_str
            ))
        })
    }
}

impl InferenceAdapter for PythonBridge {
    fn generate(&self, text: &str, params: &GenerationParameters) -> Result<Waveform> {
        if !self.is_ready() {
            return Err(Error::EngineUnavailable(
                "inference engine is not initialized".to_string(),
            ));
        }

        debug!("Calling Python TTS for {} chars", text.chars().count());

        let request = PythonTTSRequest {
            command: "generate".to_string(),
            device: self.device.clone(),
            text: Some(text.to_string()),
            audio_prompt_path: Some(params.voice.path.to_string_lossy().to_string()),
            exaggeration: Some(params.exaggeration),
            cfg_weight: Some(params.cfg_weight),
            temperature: Some(params.temperature),
        };

        let response = self.call_python(&request)?;

        if let Some(err) = response.error {
            return Err(Error::Generation(err));
        }

        let audio_b64 = response
            .audio_base64
            .ok_or_else(|| Error::Generation("No audio in response".to_string()))?;

        use base64::Engine;
        let wav_bytes = base64::engine::general_purpose::STANDARD
            .decode(&audio_b64)
            .map_err(|e| Error::Generation(format!("Failed to decode audio: {}", e)))?;

        let waveform = Waveform::from_wav_bytes(&wav_bytes)?;
        let expected = self.sample_rate();
        if waveform.sample_rate != expected {
            return Err(Error::Generation(format!(
                "Engine returned {} Hz audio, expected {} Hz",
                waveform.sample_rate, expected
            )));
        }
        if waveform.channels != self.channels() {
            return Err(Error::Generation(format!(
                "Engine returned {}-channel audio, expected {}",
                waveform.channels,
                self.channels()
            )));
        }

        debug!(
            "Generated {} frames at {} Hz",
            waveform.frames(),
            waveform.sample_rate
        );
        Ok(waveform)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    fn readiness(&self) -> EngineReadiness {
        self.readiness
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
