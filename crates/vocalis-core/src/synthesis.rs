//! Request orchestration: validation, chunked inference, assembly and streaming

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::audio::{concatenate_with_gap, AudioEncoder, AudioFormat, Waveform};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::inference::{GenerationParameters, InferenceAdapter, ParameterOverrides, VoiceReference};
use crate::memory::{self, MemorySample};
use crate::status::{RequestParameters, RequestState, StatusManager, StatusUpdate};
use crate::streaming::{StreamEncoder, StreamFormat};
use crate::text::{split, ChunkStrategy, StreamingSettings};

/// A streaming response ready to be handed to the transport
pub struct SpeechStream {
    pub request_id: String,
    pub content_type: &'static str,
    pub body: ReceiverStream<Result<Bytes>>,
}

/// Drives requests through segmentation, inference, assembly and encoding.
///
/// Chunks of a request are generated strictly in order, each on a blocking
/// worker. When streaming, chunk i+1 is not started until the transport has
/// taken chunk i. Every request that passes validation gets a status record, and the
/// record is always finalized.
pub struct SpeechSynthesizer {
    adapter: Arc<dyn InferenceAdapter>,
    status: Arc<StatusManager>,
    config: EngineConfig,
    request_counter: AtomicU64,
    cleanup_counter: Arc<AtomicU64>,
}

impl SpeechSynthesizer {
    pub fn new(
        adapter: Arc<dyn InferenceAdapter>,
        status: Arc<StatusManager>,
        config: EngineConfig,
    ) -> Self {
        Self {
            adapter,
            status,
            config,
            request_counter: AtomicU64::new(0),
            cleanup_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn adapter(&self) -> &Arc<dyn InferenceAdapter> {
        &self.adapter
    }

    pub fn status(&self) -> &Arc<StatusManager> {
        &self.status
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Requests handled since startup
    pub fn request_count(&self) -> u64 {
        self.request_counter.load(Ordering::Relaxed)
    }

    /// Periodic cleanup passes run since startup
    pub fn cleanup_count(&self) -> u64 {
        self.cleanup_counter.load(Ordering::Relaxed)
    }

    /// Reject empty or over-long input
    pub fn validate_text(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(Error::Validation("Input text cannot be empty".to_string()));
        }
        if text.chars().count() > self.config.max_total_length {
            return Err(Error::Validation(format!(
                "Input text too long. Maximum {} characters allowed.",
                self.config.max_total_length
            )));
        }
        Ok(())
    }

    /// Resolve request overrides against the configured defaults
    pub fn resolve_parameters(
        &self,
        overrides: ParameterOverrides,
        voice: Option<VoiceReference>,
    ) -> Result<GenerationParameters> {
        let voice = voice
            .unwrap_or_else(|| VoiceReference::configured(self.config.voice_sample_path.clone()));
        GenerationParameters::resolve(overrides, voice, &self.config)
    }

    fn admit(&self, text: &str, params: &GenerationParameters) -> Result<()> {
        self.validate_text(text)?;
        params.validate()?;
        if !self.adapter.is_ready() {
            let readiness = self.adapter.readiness();
            return Err(Error::EngineUnavailable(
                readiness
                    .error
                    .unwrap_or_else(|| format!("engine is {:?}", readiness.state)),
            ));
        }
        Ok(())
    }

    fn begin(
        &self,
        text: &str,
        params: &GenerationParameters,
        streaming: Option<StreamingSettings>,
    ) -> RequestGuard {
        let request_id = self.status.start(
            text,
            params.voice.source.clone(),
            RequestParameters {
                generation: params.clone(),
                streaming,
            },
        );
        let number = self.request_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let monitor_memory = self.config.enable_memory_monitoring;

        let mut update = StatusUpdate::step("Starting TTS generation");
        if let Some(sample) = memory_sample(monitor_memory) {
            info!(
                "Request #{} [{}] - initial memory: {:.1} MB",
                number,
                request_id,
                sample.cpu_memory_mb.unwrap_or_default()
            );
            update = update.memory(sample);
        }
        self.status
            .update(&request_id, RequestState::Initializing, update);

        RequestGuard {
            status: Arc::clone(&self.status),
            request_id,
            number,
            cleanup_interval: self.config.memory_cleanup_interval,
            cleanups: Arc::clone(&self.cleanup_counter),
            monitor_memory,
            finalized: false,
        }
    }

    /// Run inference for one chunk on a blocking worker
    async fn generate_chunk(&self, text: &str, params: &GenerationParameters) -> Result<Waveform> {
        let adapter = Arc::clone(&self.adapter);
        let text = text.to_string();
        let params = params.clone();
        tokio::task::spawn_blocking(move || adapter.generate(&text, &params))
            .await
            .map_err(|e| Error::Generation(format!("inference worker failed: {}", e)))?
    }

    /// Synthesize `text` into a single WAV buffer
    pub async fn synthesize(&self, text: &str, params: GenerationParameters) -> Result<Vec<u8>> {
        self.admit(text, &params)?;

        let mut guard = self.begin(text, &params, None);
        let result = self.run_buffered(&guard, text, &params).await;
        match &result {
            Ok(wav) => {
                info!(
                    "[{}] Audio generation completed ({} bytes)",
                    guard.request_id,
                    wav.len()
                );
                guard.finish(RequestState::Completed, StatusUpdate::step("Completed"));
            }
            Err(e) => {
                error!("[{}] TTS generation failed: {}", guard.request_id, e);
                guard.finish(
                    RequestState::Error,
                    StatusUpdate::step("Failed").error(e.to_string()),
                );
            }
        }
        result
    }

    async fn run_buffered(
        &self,
        guard: &RequestGuard,
        text: &str,
        params: &GenerationParameters,
    ) -> Result<Vec<u8>> {
        let id = guard.request_id.as_str();
        self.status.update(
            id,
            RequestState::ProcessingText,
            StatusUpdate::step("Processing text"),
        );

        let chunks = split(text, self.config.max_chunk_length, ChunkStrategy::Sentence);
        let total = chunks.len();
        self.status.update(
            id,
            RequestState::Chunking,
            StatusUpdate::step(format!("Split text into {} chunks", total)).chunks(0, total),
        );
        info!(
            "[{}] Processing {} text chunks with {} (exaggeration {}, cfg_weight {}, temperature {})",
            id, total, params.voice.source, params.exaggeration, params.cfg_weight, params.temperature
        );

        let mut waveforms = Vec::with_capacity(total);
        for (i, chunk) in chunks.iter().enumerate() {
            self.status.update(
                id,
                RequestState::GeneratingAudio,
                StatusUpdate::step(format!("Generating audio for chunk {}/{}", i + 1, total))
                    .chunks(i, total),
            );
            debug!("[{}] Chunk {}/{}: {} chars", id, i + 1, total, chunk.chars().count());
            waveforms.push(self.generate_chunk(chunk, params).await?);
        }

        let sample_rate = self.adapter.sample_rate();
        let step = if total > 1 {
            "Concatenating audio chunks"
        } else {
            "Preparing audio"
        };
        self.status.update(
            id,
            RequestState::Concatenating,
            StatusUpdate::step(step).chunks(total, total),
        );
        let waveform =
            concatenate_with_gap(waveforms, sample_rate, self.config.inter_chunk_silence_ms)?;

        self.status.update(
            id,
            RequestState::Finalizing,
            StatusUpdate::step("Converting to WAV format"),
        );
        AudioEncoder::new(waveform.sample_rate, waveform.channels)
            .encode(&waveform.samples, AudioFormat::Wav)
    }

    /// Start a streaming synthesis.
    ///
    /// Validation and engine availability are checked before anything is
    /// sent; failures after that point terminate the stream.
    pub fn stream(
        self: Arc<Self>,
        text: &str,
        params: GenerationParameters,
        settings: StreamingSettings,
        format: StreamFormat,
    ) -> Result<SpeechStream> {
        self.admit(text, &params)?;

        let mut encoder = StreamEncoder::new(
            format,
            self.adapter.sample_rate(),
            self.adapter.channels(),
            text.chars().count(),
        );
        let preamble = encoder.preamble()?;
        let content_type = encoder.content_type();

        let mut guard = self.begin(text, &params, Some(settings));
        let request_id = guard.request_id.clone();
        self.status.update(
            &request_id,
            RequestState::ProcessingText,
            StatusUpdate::step("Processing text for streaming"),
        );
        let chunks = settings.split(text);
        info!(
            "[{}] Streaming {} chunks as {:?} ({} strategy, chunk size {})",
            request_id,
            chunks.len(),
            format,
            settings.strategy,
            settings.chunk_size
        );

        let (tx, rx) = mpsc::channel::<Result<Bytes>>(1);
        let this = self;
        tokio::spawn(async move {
            let id = guard.request_id.clone();
            let outcome = this
                .run_stream(&id, &chunks, &params, &mut encoder, preamble, &tx)
                .await;

            match outcome {
                Ok(()) => {
                    info!("[{}] Streaming completed", id);
                    guard.finish(RequestState::Completed, StatusUpdate::step("Completed"));
                }
                Err(StreamStop::Disconnected) => {
                    info!("[{}] Client disconnected, stopping generation", id);
                    guard.finish(
                        RequestState::Error,
                        StatusUpdate::step("Stopped").error("client disconnected"),
                    );
                }
                Err(StreamStop::Failed(e)) => {
                    error!("[{}] Streaming failed: {}", id, e);
                    guard.finish(
                        RequestState::Error,
                        StatusUpdate::step("Failed").error(e.to_string()),
                    );
                    // Already-sent audio stands; the stream still ends as a failure
                    let last = match encoder.failure(&e) {
                        Some(event) => Ok(event),
                        None => Err(e),
                    };
                    let _ = tx.send(last).await;
                }
            }
        });

        Ok(SpeechStream {
            request_id,
            content_type,
            body: ReceiverStream::new(rx),
        })
    }

    async fn run_stream(
        &self,
        id: &str,
        chunks: &[String],
        params: &GenerationParameters,
        encoder: &mut StreamEncoder,
        preamble: Option<Bytes>,
        tx: &mpsc::Sender<Result<Bytes>>,
    ) -> std::result::Result<(), StreamStop> {
        if let Some(header) = preamble {
            send(tx, header).await?;
        }

        let total = chunks.len();
        self.status.update(
            id,
            RequestState::Chunking,
            StatusUpdate::step(format!("Split text into {} chunks", total)).chunks(0, total),
        );

        for (i, chunk) in chunks.iter().enumerate() {
            // Resolves once the previous item has been taken off the channel
            let permit = tx.reserve().await.map_err(|_| StreamStop::Disconnected)?;
            self.status.update(
                id,
                RequestState::GeneratingAudio,
                StatusUpdate::step(format!("Streaming chunk {}/{}", i + 1, total)).chunks(i, total),
            );
            let waveform = self.generate_chunk(chunk, params).await?;
            permit.send(Ok(encoder.encode_chunk(&waveform)?));
            debug!(
                "[{}] Sent chunk {}/{} ({:.2}s)",
                id,
                i + 1,
                total,
                waveform.duration_secs()
            );
        }

        self.status.update(
            id,
            RequestState::Finalizing,
            StatusUpdate::step("Finishing stream").chunks(total, total),
        );
        if let Some(done) = encoder.finish()? {
            send(tx, done).await?;
        }
        Ok(())
    }
}

/// Why a stream ended early
enum StreamStop {
    Disconnected,
    Failed(Error),
}

impl From<Error> for StreamStop {
    fn from(err: Error) -> Self {
        StreamStop::Failed(err)
    }
}

async fn send(
    tx: &mpsc::Sender<Result<Bytes>>,
    bytes: Bytes,
) -> std::result::Result<(), StreamStop> {
    tx.send(Ok(bytes))
        .await
        .map_err(|_| StreamStop::Disconnected)
}

fn memory_sample(enabled: bool) -> Option<MemorySample> {
    enabled
        .then(memory::sample)
        .filter(|sample| !sample.is_empty())
}

/// Finalizes the status record and runs periodic hygiene on every exit path
struct RequestGuard {
    status: Arc<StatusManager>,
    request_id: String,
    number: u64,
    cleanup_interval: u64,
    cleanups: Arc<AtomicU64>,
    monitor_memory: bool,
    finalized: bool,
}

impl RequestGuard {
    fn finish(&mut self, state: RequestState, mut update: StatusUpdate) {
        if let Some(sample) = memory_sample(self.monitor_memory) {
            info!(
                "Request #{} [{}] - final memory: {:.1} MB",
                self.number,
                self.request_id,
                sample.cpu_memory_mb.unwrap_or_default()
            );
            update = update.memory(sample);
        }
        self.status.update(&self.request_id, state, update);
        self.finalized = true;
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        if !self.finalized {
            warn!("[{}] Request abandoned before completion", self.request_id);
            self.finish(
                RequestState::Error,
                StatusUpdate::step("Cancelled").error("request cancelled"),
            );
        }

        if self.number % self.cleanup_interval.max(1) == 0 {
            memory::cleanup(self.number);
            self.cleanups.fetch_add(1, Ordering::Relaxed);
        }
    }
}
