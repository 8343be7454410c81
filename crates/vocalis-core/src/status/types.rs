//! Request lifecycle records and their serialized views

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::inference::GenerationParameters;
use crate::memory::MemorySample;
use crate::text::StreamingSettings;

/// Lifecycle state of a synthesis request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Idle,
    Initializing,
    ProcessingText,
    Chunking,
    GeneratingAudio,
    Concatenating,
    Finalizing,
    Completed,
    Error,
}

impl RequestState {
    /// Only terminal states finalize a record
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Completed | RequestState::Error)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal() && *self != RequestState::Idle
    }
}

/// Chunk-level progress of a request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progress {
    pub current_chunk: usize,
    pub total_chunks: usize,
    pub current_step: String,
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl Progress {
    pub fn progress_percentage(&self) -> f64 {
        if self.total_chunks == 0 {
            0.0
        } else {
            self.current_chunk as f64 / self.total_chunks as f64 * 100.0
        }
    }
}

/// Parameters recorded for a request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestParameters {
    #[serde(flatten)]
    pub generation: GenerationParameters,
    #[serde(flatten)]
    pub streaming: Option<StreamingSettings>,
}

impl From<GenerationParameters> for RequestParameters {
    fn from(generation: GenerationParameters) -> Self {
        Self {
            generation,
            streaming: None,
        }
    }
}

/// Live or archived status of one request
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub request_id: String,
    pub state: RequestState,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub text_length: usize,
    pub text_preview: String,
    pub voice_source: String,
    pub parameters: RequestParameters,
    pub progress: Progress,
    pub error_message: Option<String>,
    pub memory_usage: MemorySample,
}

impl RequestRecord {
    /// Seconds from start to end, or to now while the request is live
    pub fn duration_seconds(&self) -> f64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn view(&self) -> RecordView {
        RecordView {
            request_id: self.request_id.clone(),
            status: self.state,
            start_time: epoch_secs(self.start_time),
            end_time: self.end_time.map(epoch_secs),
            text_length: self.text_length,
            text_preview: self.text_preview.clone(),
            voice_source: self.voice_source.clone(),
            parameters: self.parameters.clone(),
            progress: ProgressView {
                current_chunk: self.progress.current_chunk,
                total_chunks: self.progress.total_chunks,
                current_step: self.progress.current_step.clone(),
                estimated_completion: self.progress.estimated_completion.map(epoch_secs),
                progress_percentage: self.progress.progress_percentage(),
            },
            error_message: self.error_message.clone(),
            memory_usage: self.memory_usage,
            duration_seconds: self.duration_seconds(),
            is_active: self.is_active(),
        }
    }
}

fn epoch_secs(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.0
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    pub current_chunk: usize,
    pub total_chunks: usize,
    pub current_step: String,
    pub estimated_completion: Option<f64>,
    pub progress_percentage: f64,
}

/// Serialized request record; timestamps are seconds since the Unix epoch
#[derive(Debug, Clone, Serialize)]
pub struct RecordView {
    pub request_id: String,
    pub status: RequestState,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub text_length: usize,
    pub text_preview: String,
    pub voice_source: String,
    pub parameters: RequestParameters,
    pub progress: ProgressView,
    pub error_message: Option<String>,
    pub memory_usage: MemorySample,
    pub duration_seconds: f64,
    pub is_active: bool,
}

/// Answer to "what is the server doing right now"
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StatusSnapshot {
    Idle {
        status: RequestState,
        is_processing: bool,
        total_requests: u64,
        message: String,
    },
    Active {
        #[serde(flatten)]
        record: RecordView,
        is_processing: bool,
        total_requests: u64,
    },
}

impl StatusSnapshot {
    pub fn is_processing(&self) -> bool {
        matches!(self, StatusSnapshot::Active { .. })
    }
}

/// Progress-only view of the live request
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProgressSnapshot {
    Idle {
        is_processing: bool,
        status: RequestState,
        message: String,
    },
    Active {
        is_processing: bool,
        status: RequestState,
        current_step: String,
        current_chunk: usize,
        total_chunks: usize,
        progress_percentage: f64,
        duration_seconds: f64,
        estimated_completion: Option<f64>,
        text_preview: String,
    },
}

/// Aggregate counters over the archived history
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Statistics {
    pub total_requests: u64,
    pub completed_requests: usize,
    pub error_requests: usize,
    /// Percentage of finished requests that completed, 0 to 100
    pub success_rate: f64,
    pub average_duration_seconds: f64,
    pub average_text_length: f64,
    pub is_processing: bool,
}
