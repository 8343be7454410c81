//! Host-memory waveform value passed between the adapter, assembler and encoders

use std::io::Cursor;

use crate::error::{Error, Result};

/// Interleaved f32 samples in [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(samples, sample_rate, 1)
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f32 / self.sample_rate as f32
    }

    /// Decode a WAV container into samples
    pub fn from_wav_bytes(wav_bytes: &[u8]) -> Result<Self> {
        let mut reader = hound::WavReader::new(Cursor::new(wav_bytes))
            .map_err(|e| Error::AudioError(format!("Failed to parse WAV: {}", e)))?;

        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => {
                let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<std::result::Result<_, _>>()
            }
            hound::SampleFormat::Float => reader.samples::<f32>().collect(),
        }
        .map_err(|e| Error::AudioError(format!("Failed to read WAV samples: {}", e)))?;

        Ok(Self::new(samples, spec.sample_rate, spec.channels))
    }
}
