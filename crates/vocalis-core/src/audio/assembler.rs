//! Joins per-chunk waveforms into a single response waveform

use tracing::debug;

use crate::audio::Waveform;
use crate::error::{Error, Result};

/// Gap inserted between consecutive chunks
pub const INTER_CHUNK_SILENCE_MS: u32 = 100;

/// Merges between progress log lines on long requests
const LOG_INTERVAL: usize = 10;

/// Number of silence frames for `ms` milliseconds at `sample_rate`
pub fn silence_frames(sample_rate: u32, ms: u32) -> usize {
    (sample_rate as f64 * ms as f64 / 1000.0).round() as usize
}

/// Concatenate chunk waveforms with 100ms of silence between them.
pub fn concatenate(chunks: Vec<Waveform>, sample_rate: u32) -> Result<Waveform> {
    concatenate_with_gap(chunks, sample_rate, INTER_CHUNK_SILENCE_MS)
}

/// Concatenate chunk waveforms with `gap_ms` of silence between them.
///
/// A single chunk is returned unchanged. Every input must share the sample
/// rate and channel count of the first.
pub fn concatenate_with_gap(
    chunks: Vec<Waveform>,
    sample_rate: u32,
    gap_ms: u32,
) -> Result<Waveform> {
    let channels = match chunks.first() {
        Some(first) => first.channels,
        None => return Err(Error::AudioError("No audio chunks to concatenate".to_string())),
    };

    for (i, chunk) in chunks.iter().enumerate() {
        if chunk.sample_rate != sample_rate || chunk.channels != channels {
            return Err(Error::AudioError(format!(
                "Chunk {} is {} Hz/{} ch, expected {} Hz/{} ch",
                i, chunk.sample_rate, chunk.channels, sample_rate, channels
            )));
        }
    }

    let gap_samples = silence_frames(sample_rate, gap_ms) * channels as usize;
    let total = chunks.iter().map(|c| c.samples.len()).sum::<usize>()
        + gap_samples * (chunks.len() - 1);

    let mut sources = chunks.into_iter();
    let mut samples = match sources.next() {
        Some(first) if sources.len() == 0 => return Ok(first),
        Some(first) => first.samples,
        None => Vec::new(),
    };
    samples.reserve_exact(total - samples.len());

    for (i, chunk) in sources.enumerate() {
        samples.resize(samples.len() + gap_samples, 0.0);
        samples.extend_from_slice(&chunk.samples);
        // `chunk` is dropped here, releasing its buffer as soon as it is merged
        if (i + 1) % LOG_INTERVAL == 0 {
            debug!("Merged {} chunks ({} samples so far)", i + 2, samples.len());
        }
    }

    Ok(Waveform::new(samples, sample_rate, channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_chunk_unchanged() {
        let chunk = Waveform::mono(vec![0.1, 0.2, 0.3], 24000);
        let out = concatenate(vec![chunk.clone()], 24000).unwrap();
        assert_eq!(out, chunk);
    }

    #[test]
    fn test_two_chunks_with_gap() {
        let c1 = Waveform::mono(vec![0.5; 1000], 24000);
        let c2 = Waveform::mono(vec![-0.5; 500], 24000);
        let out = concatenate(vec![c1, c2], 24000).unwrap();

        assert_eq!(out.frames(), 1000 + 500 + 2400);
        assert_eq!(out.samples[999], 0.5);
        assert!(out.samples[1000..3400].iter().all(|&s| s == 0.0));
        assert_eq!(out.samples[3400], -0.5);
    }

    #[test]
    fn test_gap_rounds_to_nearest_frame() {
        assert_eq!(silence_frames(22050, 100), 2205);
        assert_eq!(silence_frames(44101, 100), 4410);
        assert_eq!(silence_frames(11025, 100), 1103);
    }

    #[test]
    fn test_many_chunks_length() {
        let chunks: Vec<_> = (0..25).map(|_| Waveform::mono(vec![0.1; 10], 16000)).collect();
        let out = concatenate(chunks, 16000).unwrap();
        assert_eq!(out.frames(), 25 * 10 + 24 * 1600);
    }

    #[test]
    fn test_stereo_gap_covers_both_channels() {
        let c1 = Waveform::new(vec![0.1; 20], 10000, 2);
        let c2 = Waveform::new(vec![0.2; 20], 10000, 2);
        let out = concatenate(vec![c1, c2], 10000).unwrap();
        assert_eq!(out.channels, 2);
        assert_eq!(out.frames(), 10 + 10 + 1000);
    }

    #[test]
    fn test_mismatched_sample_rate_rejected() {
        let c1 = Waveform::mono(vec![0.1; 10], 24000);
        let c2 = Waveform::mono(vec![0.1; 10], 16000);
        assert!(concatenate(vec![c1, c2], 24000).is_err());
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(concatenate(Vec::new(), 24000).is_err());
    }
}
