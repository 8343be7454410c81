//! Audio encoding to WAV and raw PCM

use hound::{WavSpec, WavWriter};
use std::io::Cursor;
use tracing::debug;

use crate::error::{Error, Result};

/// Supported audio output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// WAV format (16-bit PCM)
    Wav,
    /// Raw PCM samples (i16 little-endian), no container header
    RawI16,
}

/// Audio encoder for converting f32 samples to various formats
#[derive(Debug, Clone, Copy)]
pub struct AudioEncoder {
    sample_rate: u32,
    channels: u16,
}

impl AudioEncoder {
    /// Create a new encoder
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// Encode samples to the specified format
    pub fn encode(&self, samples: &[f32], format: AudioFormat) -> Result<Vec<u8>> {
        match format {
            AudioFormat::Wav => self.encode_wav(samples),
            AudioFormat::RawI16 => Ok(self.encode_raw_i16(samples)),
        }
    }

    /// Provisional container header for a stream of unknown length.
    ///
    /// The header is taken from a WAV of one second of silence, so it declares
    /// a one-second data chunk regardless of how much audio follows.
    pub fn streaming_header(&self) -> Result<Vec<u8>> {
        let silence = vec![0.0f32; self.sample_rate as usize * self.channels as usize];
        let mut wav = self.encode_wav(&silence)?;
        let offset = wav_data_offset(&wav)?;
        wav.truncate(offset);
        Ok(wav)
    }

    /// Encode to WAV format
    fn encode_wav(&self, samples: &[f32]) -> Result<Vec<u8>> {
        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer =
                WavWriter::new(&mut buffer, spec).map_err(|e| Error::AudioError(e.to_string()))?;

            for &sample in samples {
                writer
                    .write_sample(to_i16(sample))
                    .map_err(|e| Error::AudioError(e.to_string()))?;
            }

            writer
                .finalize()
                .map_err(|e| Error::AudioError(e.to_string()))?;
        }

        debug!(
            "Encoded {} samples to WAV ({} bytes)",
            samples.len(),
            buffer.get_ref().len()
        );
        Ok(buffer.into_inner())
    }

    /// Encode to raw i16 samples
    fn encode_raw_i16(&self, samples: &[f32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            bytes.extend_from_slice(&to_i16(sample).to_le_bytes());
        }
        bytes
    }

    /// Get content type for format
    pub fn content_type(format: AudioFormat) -> &'static str {
        match format {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::RawI16 => "application/octet-stream",
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

/// Inverse of the `v / 32768` decode, so 16-bit input round-trips exactly
fn to_i16(sample: f32) -> i16 {
    (sample * 32768.0)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Byte offset of the first sample in a RIFF/WAVE buffer
pub fn wav_data_offset(wav: &[u8]) -> Result<usize> {
    if wav.len() < 12 || &wav[0..4] != b"RIFF" || &wav[8..12] != b"WAVE" {
        return Err(Error::AudioError("Not a RIFF/WAVE buffer".to_string()));
    }

    let mut pos = 12;
    while pos + 8 <= wav.len() {
        let id = &wav[pos..pos + 4];
        let size = u32::from_le_bytes([wav[pos + 4], wav[pos + 5], wav[pos + 6], wav[pos + 7]])
            as usize;
        if id == b"data" {
            return Ok(pos + 8);
        }
        // Chunks are word aligned
        pos += 8 + size + (size & 1);
    }

    Err(Error::AudioError("WAV buffer has no data chunk".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_matches_wav_payload() {
        let encoder = AudioEncoder::new(24000, 1);
        let samples = [0.0, 0.1, -0.1, 1.5];

        let wav = encoder.encode(&samples, AudioFormat::Wav).unwrap();
        let raw = encoder.encode(&samples, AudioFormat::RawI16).unwrap();

        let offset = wav_data_offset(&wav).unwrap();
        assert_eq!(&wav[offset..], raw.as_slice());
        assert_eq!(raw.len(), samples.len() * 2);
    }

    #[test]
    fn test_streaming_header_declares_one_second() {
        let encoder = AudioEncoder::new(24000, 1);
        let header = encoder.streaming_header().unwrap();

        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[header.len() - 8..header.len() - 4], b"data");
        let declared = u32::from_le_bytes([
            header[header.len() - 4],
            header[header.len() - 3],
            header[header.len() - 2],
            header[header.len() - 1],
        ]);
        assert_eq!(declared, 24000 * 2);
    }

    #[test]
    fn test_clamps_out_of_range_samples() {
        let encoder = AudioEncoder::new(8000, 1);
        let raw = encoder.encode(&[2.0, -2.0], AudioFormat::RawI16).unwrap();
        assert_eq!(i16::from_le_bytes([raw[0], raw[1]]), 32767);
        assert_eq!(i16::from_le_bytes([raw[2], raw[3]]), -32768);
    }

    #[test]
    fn test_decoded_pcm16_reencodes_identically() {
        let pcm: [i16; 6] = [1, 100, 1000, 32767, -1, -32768];
        let spec = WavSpec {
            channels: 1,
            sample_rate: 24000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut engine_wav = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut engine_wav, spec).unwrap();
            for v in pcm {
                writer.write_sample(v).unwrap();
            }
            writer.finalize().unwrap();
        }
        let engine_wav = engine_wav.into_inner();

        let waveform = crate::audio::Waveform::from_wav_bytes(&engine_wav).unwrap();
        let encoder = AudioEncoder::new(24000, 1);

        let wav = encoder.encode(&waveform.samples, AudioFormat::Wav).unwrap();
        assert_eq!(wav, engine_wav);

        let raw = encoder.encode(&waveform.samples, AudioFormat::RawI16).unwrap();
        let offset = wav_data_offset(&engine_wav).unwrap();
        assert_eq!(raw.as_slice(), &engine_wav[offset..]);
    }

    #[test]
    fn test_data_offset_rejects_non_wav() {
        assert!(wav_data_offset(b"ID3\x03 not a wave").is_err());
    }
}
