//! Server-sent event payloads for event-mode streaming

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Approximate audio tokens per second of output
const OUTPUT_TOKENS_PER_SECOND: f64 = 25.0;

/// Delivery mode for a streaming request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    /// Provisional WAV header followed by raw PCM
    #[default]
    Audio,
    /// `data: {json}` server-sent events
    Sse,
}

/// Best-effort usage numbers reported at the end of an event stream.
///
/// These are not tokenizer counts: input is the character count and output is
/// derived from the generated audio duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn estimate(input_chars: usize, audio_secs: f64) -> Self {
        let input_tokens = input_chars as u64;
        let output_tokens = (audio_secs.max(0.0) * OUTPUT_TOKENS_PER_SECOND).ceil() as u64;
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventError {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One server-sent event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Base64 of one chunk's raw PCM bytes
    #[serde(rename = "speech.audio.delta")]
    Delta { audio: String },

    /// Terminal event of a successful stream
    #[serde(rename = "speech.audio.done")]
    Done { usage: Usage },

    /// Terminal event of a failed stream
    #[serde(rename = "error")]
    Error { error: EventError },
}

impl StreamEvent {
    pub fn failure(err: &Error) -> Self {
        StreamEvent::Error {
            error: EventError {
                message: err.to_string(),
                kind: err.kind().to_string(),
            },
        }
    }

    /// Frame the event as `data: {json}\n\n`
    pub fn to_sse(&self) -> Result<Bytes> {
        let payload = serde_json::to_string(self)?;
        Ok(Bytes::from(format!("data: {payload}\n\n")))
    }
}
