//! Audio assembly and encoding for TTS output

mod assembler;
mod encoder;
mod waveform;

pub use assembler::{concatenate, concatenate_with_gap, silence_frames, INTER_CHUNK_SILENCE_MS};
pub use encoder::{wav_data_offset, AudioEncoder, AudioFormat};
pub use waveform::Waveform;
