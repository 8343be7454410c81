//! Per-request wire encoder for the two streaming modes

use base64::Engine;
use bytes::Bytes;

use super::events::{StreamEvent, StreamFormat, Usage};
use crate::audio::{AudioEncoder, AudioFormat, Waveform};
use crate::error::{Error, Result};

/// Turns chunk waveforms into wire bytes for one streaming request.
///
/// Raw mode writes a provisional WAV header and then bare PCM; event mode
/// wraps each chunk in a `speech.audio.delta` event and closes with
/// `speech.audio.done`.
#[derive(Debug)]
pub enum StreamEncoder {
    Raw {
        encoder: AudioEncoder,
    },
    Events {
        encoder: AudioEncoder,
        input_chars: usize,
        frames_sent: u64,
    },
}

impl StreamEncoder {
    pub fn new(format: StreamFormat, sample_rate: u32, channels: u16, input_chars: usize) -> Self {
        let encoder = AudioEncoder::new(sample_rate, channels);
        match format {
            StreamFormat::Audio => StreamEncoder::Raw { encoder },
            StreamFormat::Sse => StreamEncoder::Events {
                encoder,
                input_chars,
                frames_sent: 0,
            },
        }
    }

    pub fn format(&self) -> StreamFormat {
        match self {
            StreamEncoder::Raw { .. } => StreamFormat::Audio,
            StreamEncoder::Events { .. } => StreamFormat::Sse,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            StreamEncoder::Raw { .. } => AudioEncoder::content_type(AudioFormat::Wav),
            StreamEncoder::Events { .. } => "text/event-stream",
        }
    }

    /// Bytes sent before the first chunk
    pub fn preamble(&self) -> Result<Option<Bytes>> {
        match self {
            StreamEncoder::Raw { encoder } => Ok(Some(Bytes::from(encoder.streaming_header()?))),
            StreamEncoder::Events { .. } => Ok(None),
        }
    }

    fn encoder(&self) -> &AudioEncoder {
        match self {
            StreamEncoder::Raw { encoder } | StreamEncoder::Events { encoder, .. } => encoder,
        }
    }

    /// Wire bytes for one chunk, in order.
    ///
    /// The chunk must match the rate and channel layout announced up front.
    pub fn encode_chunk(&mut self, waveform: &Waveform) -> Result<Bytes> {
        let encoder = self.encoder();
        if waveform.sample_rate != encoder.sample_rate() || waveform.channels != encoder.channels()
        {
            return Err(Error::AudioError(format!(
                "Chunk is {} Hz/{} ch but the stream is {} Hz/{} ch",
                waveform.sample_rate,
                waveform.channels,
                encoder.sample_rate(),
                encoder.channels()
            )));
        }

        match self {
            StreamEncoder::Raw { encoder } => Ok(Bytes::from(
                encoder.encode(&waveform.samples, AudioFormat::RawI16)?,
            )),
            StreamEncoder::Events {
                encoder,
                frames_sent,
                ..
            } => {
                let pcm = encoder.encode(&waveform.samples, AudioFormat::RawI16)?;
                *frames_sent += waveform.frames() as u64;
                StreamEvent::Delta {
                    audio: base64::engine::general_purpose::STANDARD.encode(pcm),
                }
                .to_sse()
            }
        }
    }

    /// Closing bytes of a successful stream
    pub fn finish(&self) -> Result<Option<Bytes>> {
        match self {
            StreamEncoder::Raw { .. } => Ok(None),
            StreamEncoder::Events {
                encoder,
                input_chars,
                frames_sent,
            } => {
                let audio_secs = *frames_sent as f64 / encoder.sample_rate().max(1) as f64;
                StreamEvent::Done {
                    usage: Usage::estimate(*input_chars, audio_secs),
                }
                .to_sse()
                .map(Some)
            }
        }
    }

    /// Closing bytes of a failed stream.
    ///
    /// Raw mode has no in-band error signal, so the caller must end the body
    /// with an error instead.
    pub fn failure(&self, err: &Error) -> Option<Bytes> {
        match self {
            StreamEncoder::Raw { .. } => None,
            StreamEncoder::Events { .. } => StreamEvent::failure(err).to_sse().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav_data_offset;

    fn parse_event(bytes: &[u8]) -> serde_json::Value {
        let text = std::str::from_utf8(bytes).unwrap();
        let payload = text
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .unwrap();
        serde_json::from_str(payload).unwrap()
    }

    #[test]
    fn test_raw_mode_header_then_pcm() {
        let mut enc = StreamEncoder::new(StreamFormat::Audio, 16000, 1, 5);
        assert_eq!(enc.content_type(), "audio/wav");

        let header = enc.preamble().unwrap().unwrap();
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(wav_data_offset(&header).unwrap(), header.len());

        let chunk = enc.encode_chunk(&Waveform::mono(vec![0.5; 100], 16000)).unwrap();
        assert_eq!(chunk.len(), 200);
        assert_eq!(i16::from_le_bytes([chunk[0], chunk[1]]), 16384);

        assert!(enc.finish().unwrap().is_none());
        assert!(enc.failure(&Error::Generation("x".into())).is_none());
    }

    #[test]
    fn test_event_mode_sequence() {
        let mut enc = StreamEncoder::new(StreamFormat::Sse, 1000, 1, 12);
        assert_eq!(enc.content_type(), "text/event-stream");
        assert!(enc.preamble().unwrap().is_none());

        let delta = enc.encode_chunk(&Waveform::mono(vec![0.0; 500], 1000)).unwrap();
        let json = parse_event(&delta);
        assert_eq!(json["type"], "speech.audio.delta");
        let audio = base64::engine::general_purpose::STANDARD
            .decode(json["audio"].as_str().unwrap())
            .unwrap();
        assert_eq!(audio.len(), 1000);

        enc.encode_chunk(&Waveform::mono(vec![0.0; 500], 1000)).unwrap();

        let done = parse_event(&enc.finish().unwrap().unwrap());
        assert_eq!(done["type"], "speech.audio.done");
        assert_eq!(done["usage"]["input_tokens"], 12);
        assert_eq!(done["usage"]["output_tokens"], 25);
        assert_eq!(done["usage"]["total_tokens"], 37);
    }

    #[test]
    fn test_event_mode_failure() {
        let enc = StreamEncoder::new(StreamFormat::Sse, 24000, 1, 3);
        let bytes = enc
            .failure(&Error::Generation("CUDA out of memory".into()))
            .unwrap();
        let json = parse_event(&bytes);
        assert_eq!(json["type"], "error");
        assert_eq!(json["error"]["type"], "generation_error");
    }

    #[test]
    fn test_stereo_header_and_mismatched_chunk() {
        let mut enc = StreamEncoder::new(StreamFormat::Audio, 8000, 2, 0);
        let header = enc.preamble().unwrap().unwrap();
        assert_eq!(u16::from_le_bytes([header[22], header[23]]), 2);

        let stereo = Waveform::new(vec![0.0; 20], 8000, 2);
        assert_eq!(enc.encode_chunk(&stereo).unwrap().len(), 40);

        let mono = Waveform::mono(vec![0.0; 10], 8000);
        assert!(matches!(enc.encode_chunk(&mono), Err(Error::AudioError(_))));
    }

    #[test]
    fn test_raw_chunk_carries_engine_pcm_unchanged() {
        let pcm: [i16; 6] = [1, 100, 1000, 32767, -1, -32768];
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 24000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut engine_wav = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut engine_wav, spec).unwrap();
            for v in pcm {
                writer.write_sample(v).unwrap();
            }
            writer.finalize().unwrap();
        }
        let engine_wav = engine_wav.into_inner();
        let waveform = Waveform::from_wav_bytes(&engine_wav).unwrap();

        let mut enc = StreamEncoder::new(StreamFormat::Audio, 24000, 1, 0);
        let chunk = enc.encode_chunk(&waveform).unwrap();
        let offset = wav_data_offset(&engine_wav).unwrap();
        assert_eq!(&chunk[..], &engine_wav[offset..]);
    }
}
