//! Speech generation endpoints
//!
//! JSON endpoints use the configured voice sample; the `/upload` variants take
//! multipart forms with an optional `voice_file` stored in a temp file for the
//! lifetime of the request.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::{de::DeserializeOwned, Deserialize};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use vocalis_core::{
    text::STREAMING_CHUNK_SIZE_RANGE, ChunkStrategy, ParameterOverrides, StreamFormat,
    StreamingQuality, StreamingSettings, VoiceReference,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Extensions accepted for uploaded voice samples
pub const ALLOWED_VOICE_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".flac", ".m4a", ".ogg"];

/// Largest accepted voice sample
pub const MAX_VOICE_FILE_BYTES: usize = 10 * 1024 * 1024;

/// Speech request body.
///
/// `voice`, `response_format` and `speed` are accepted for client
/// compatibility and ignored.
#[derive(Debug, Default, Deserialize)]
pub struct SpeechRequest {
    pub input: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub response_format: Option<String>,
    #[serde(default)]
    pub speed: Option<f32>,
    #[serde(default)]
    pub exaggeration: Option<f32>,
    #[serde(default)]
    pub cfg_weight: Option<f32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub stream_format: Option<StreamFormat>,
    #[serde(default)]
    pub streaming_chunk_size: Option<usize>,
    #[serde(default)]
    pub streaming_strategy: Option<ChunkStrategy>,
    #[serde(default)]
    pub streaming_quality: Option<StreamingQuality>,
}

impl SpeechRequest {
    /// Input with surrounding whitespace removed
    pub fn text(&self) -> &str {
        self.input.trim()
    }

    pub fn validate(&self, max_total_length: usize) -> Result<(), ApiError> {
        if self.text().is_empty() {
            return Err(ApiError::bad_request("Input text cannot be empty"));
        }
        if self.text().chars().count() > max_total_length {
            return Err(ApiError::bad_request(format!(
                "Input text too long. Maximum {} characters allowed.",
                max_total_length
            )));
        }
        if let Some(size) = self.streaming_chunk_size {
            if !STREAMING_CHUNK_SIZE_RANGE.contains(&size) {
                return Err(ApiError::bad_request(format!(
                    "streaming_chunk_size must be between {} and {}, got {}",
                    STREAMING_CHUNK_SIZE_RANGE.start(),
                    STREAMING_CHUNK_SIZE_RANGE.end(),
                    size
                )));
            }
        }
        Ok(())
    }

    pub fn overrides(&self) -> ParameterOverrides {
        ParameterOverrides {
            exaggeration: self.exaggeration,
            cfg_weight: self.cfg_weight,
            temperature: self.temperature,
        }
    }

    pub fn streaming_settings(&self) -> StreamingSettings {
        StreamingSettings::resolve(
            self.streaming_chunk_size,
            self.streaming_strategy,
            self.streaming_quality,
        )
    }
}

/// Voice sample received in a multipart form
struct UploadedVoice {
    filename: String,
    data: Vec<u8>,
}

fn voice_extension(filename: &str) -> Result<String, ApiError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    if ALLOWED_VOICE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(ApiError::bad_request(format!(
            "Unsupported audio format: {}. Supported formats: {}",
            if ext.is_empty() { "none" } else { ext.as_str() },
            ALLOWED_VOICE_EXTENSIONS.join(", ")
        )))
    }
}

impl UploadedVoice {
    fn validate(&self) -> Result<String, ApiError> {
        let ext = voice_extension(&self.filename)?;
        if self.data.len() > MAX_VOICE_FILE_BYTES {
            return Err(ApiError::bad_request(format!(
                "File too large. Maximum size: {}MB",
                MAX_VOICE_FILE_BYTES / (1024 * 1024)
            )));
        }
        Ok(ext)
    }

    /// Write the sample to a temp file that is removed when dropped
    async fn persist(self) -> Result<NamedTempFile, ApiError> {
        let ext = self.validate()?;
        info!(
            "Using uploaded voice file: {} ({} bytes)",
            self.filename,
            self.data.len()
        );
        tokio::task::spawn_blocking(move || {
            let mut file = tempfile::Builder::new()
                .prefix("voice_sample_")
                .suffix(&ext)
                .tempfile()?;
            file.write_all(&self.data)?;
            file.flush()?;
            Ok::<_, std::io::Error>(file)
        })
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .map_err(|e| ApiError::internal(format!("Failed to store voice file: {}", e)))
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<Option<T>, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| ApiError::bad_request(format!("{} must be a number, got '{}'", name, value)))
}

fn parse_choice<T: DeserializeOwned>(name: &str, value: &str) -> Result<Option<T>, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map(Some)
        .map_err(|_| ApiError::bad_request(format!("Invalid {}: '{}'", name, value)))
}

/// Collect form fields into a request plus an optional voice sample
async fn read_form(mut multipart: Multipart) -> Result<(SpeechRequest, Option<UploadedVoice>), ApiError> {
    let mut request = SpeechRequest::default();
    let mut voice = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "voice_file" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await?;
            if !filename.is_empty() && !data.is_empty() {
                voice = Some(UploadedVoice {
                    filename,
                    data: data.to_vec(),
                });
            }
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "input" => request.input = value,
            "voice" => request.voice = Some(value),
            "response_format" => request.response_format = Some(value),
            "speed" => request.speed = parse_number("speed", &value)?,
            "exaggeration" => request.exaggeration = parse_number("exaggeration", &value)?,
            "cfg_weight" => request.cfg_weight = parse_number("cfg_weight", &value)?,
            "temperature" => request.temperature = parse_number("temperature", &value)?,
            "stream_format" => request.stream_format = parse_choice("stream_format", &value)?,
            "streaming_chunk_size" => {
                request.streaming_chunk_size = parse_number("streaming_chunk_size", &value)?
            }
            "streaming_strategy" => {
                request.streaming_strategy = parse_choice("streaming_strategy", &value)?
            }
            "streaming_quality" => {
                request.streaming_quality = parse_choice("streaming_quality", &value)?
            }
            other => debug!("Ignoring form field '{}'", other),
        }
    }

    Ok((request, voice))
}

fn json_body(payload: Result<Json<SpeechRequest>, JsonRejection>) -> Result<SpeechRequest, ApiError> {
    payload
        .map(|Json(request)| request)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// Buffered synthesis shared by the JSON and upload endpoints
async fn generate(
    state: &AppState,
    request: &SpeechRequest,
    voice_file: Option<&NamedTempFile>,
) -> Result<Response, ApiError> {
    request.validate(state.config.engine.max_total_length)?;

    let voice = voice_file.map(|file| VoiceReference::uploaded(file.path()));
    let params = state
        .synthesizer
        .resolve_parameters(request.overrides(), voice)?;
    let wav = state.synthesizer.synthesize(request.text(), params).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/wav"),
            (header::CONTENT_DISPOSITION, "attachment; filename=speech.wav"),
        ],
        wav,
    )
        .into_response())
}

/// Streaming synthesis shared by the JSON and upload endpoints
fn start_stream(
    state: &AppState,
    request: &SpeechRequest,
    voice_file: Option<NamedTempFile>,
) -> Result<Response, ApiError> {
    request.validate(state.config.engine.max_total_length)?;

    let voice = voice_file
        .as_ref()
        .map(|file| VoiceReference::uploaded(file.path()));
    let params = state
        .synthesizer
        .resolve_parameters(request.overrides(), voice)?;
    let format = request.stream_format.unwrap_or_default();

    let stream = state.synthesizer.clone().stream(
        request.text(),
        params,
        request.streaming_settings(),
        format,
    )?;
    info!("[{}] Streaming response started", stream.request_id);

    // The uploaded sample lives until the body is finished or dropped
    let body = stream.body.map(move |item| {
        let _ = &voice_file;
        item
    });

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, stream.content_type)
        .header(header::CACHE_CONTROL, "no-cache")
        .header("X-Request-Id", stream.request_id);
    if format == StreamFormat::Audio {
        builder = builder.header(
            header::CONTENT_DISPOSITION,
            "attachment; filename=speech_stream.wav",
        );
    }
    builder
        .body(Body::from_stream(body))
        .map_err(|e| ApiError::internal(e.to_string()))
}

pub async fn speech(
    State(state): State<AppState>,
    payload: Result<Json<SpeechRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload)?;
    generate(&state, &request, None).await
}

pub async fn speech_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let (request, voice) = read_form(multipart).await?;
    request.validate(state.config.engine.max_total_length)?;

    let voice_file = match voice {
        Some(voice) => Some(voice.persist().await?),
        None => None,
    };
    // `voice_file` is dropped, and the temp file removed, once generation returns
    generate(&state, &request, voice_file.as_ref()).await
}

pub async fn speech_stream(
    State(state): State<AppState>,
    payload: Result<Json<SpeechRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload)?;
    start_stream(&state, &request, None)
}

pub async fn speech_stream_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let (request, voice) = read_form(multipart).await?;
    request.validate(state.config.engine.max_total_length)?;

    let voice_file = match voice {
        Some(voice) => Some(voice.persist().await?),
        None => None,
    };
    start_stream(&state, &request, voice_file)
}
