//! Incremental delivery of synthesized audio

mod encoder;
mod events;

pub use encoder::StreamEncoder;
pub use events::{EventError, StreamEvent, StreamFormat, Usage};
